use super::{BoxFuture, ContentStore, ProgressStore, ProgressUpdate, StoreResult};
use crate::models::{Book, BookProgressSummary, Chapter, ChapterRef, ChapterSummary, ReadingProgress};
use crate::reader::navigator::Direction;
use futures::FutureExt;
use sqlx::{SqliteConnection, SqlitePool};

/// SQLite backed content and progress store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ContentStore for SqliteStore {
    fn chapter_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Chapter>>> {
        async move {
            let chapter = sqlx::query_as::<_, Chapter>(
                "SELECT * FROM chapters WHERE slug = ? AND published = 1",
            )
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
            Ok(chapter)
        }
        .boxed()
    }

    fn adjacent_chapter<'a>(
        &'a self,
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    ) -> BoxFuture<'a, StoreResult<Option<Chapter>>> {
        async move {
            let sql = adjacent_query("*", direction);
            let chapter = sqlx::query_as::<_, Chapter>(&sql)
                .bind(book_id)
                .bind(chapter_number)
                .fetch_optional(&self.pool)
                .await?;
            Ok(chapter)
        }
        .boxed()
    }

    fn chapter_ref_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>> {
        async move {
            let chapter = sqlx::query_as::<_, ChapterRef>(
                "SELECT id, revision FROM chapters WHERE slug = ? AND published = 1",
            )
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
            Ok(chapter)
        }
        .boxed()
    }

    fn adjacent_chapter_ref<'a>(
        &'a self,
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    ) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>> {
        async move {
            let sql = adjacent_query("id, revision", direction);
            let chapter = sqlx::query_as::<_, ChapterRef>(&sql)
                .bind(book_id)
                .bind(chapter_number)
                .fetch_optional(&self.pool)
                .await?;
            Ok(chapter)
        }
        .boxed()
    }

    fn chapter_by_id<'a>(&'a self, chapter_id: i64) -> BoxFuture<'a, StoreResult<Option<Chapter>>> {
        async move {
            let chapter = sqlx::query_as::<_, Chapter>(
                "SELECT * FROM chapters WHERE id = ? AND published = 1",
            )
            .bind(chapter_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(chapter)
        }
        .boxed()
    }

    fn increment_chapter_views<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            sqlx::query("UPDATE chapters SET views = views + 1 WHERE slug = ?")
                .bind(slug)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
        .boxed()
    }

    fn book_by_id<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Option<Book>>> {
        async move {
            let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ? AND published = 1")
                .bind(book_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(book)
        }
        .boxed()
    }

    fn book_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Book>>> {
        async move {
            let book =
                sqlx::query_as::<_, Book>("SELECT * FROM books WHERE slug = ? AND published = 1")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(book)
        }
        .boxed()
    }

    fn list_chapters<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Vec<ChapterSummary>>> {
        async move {
            let chapters = sqlx::query_as::<_, ChapterSummary>(
                "SELECT id, chapter_number, title, title_hi, slug, read_time FROM chapters
                 WHERE book_id = ? AND published = 1
                 ORDER BY chapter_number",
            )
            .bind(book_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(chapters)
        }
        .boxed()
    }
}

impl ProgressStore for SqliteStore {
    fn upsert_reading<'a>(&'a self, update: &'a ProgressUpdate) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let mut tx = self.pool.begin().await?;

            // completed never goes back to reading and stays at 100%; older events do not
            // overwrite newer ones
            sqlx::query(
                "INSERT INTO reading_progress
                    (user_id, chapter_id, book_id, status, reading_percentage, scroll_position, last_read_at)
                 VALUES (?, ?, ?, 'reading', ?, ?, ?)
                 ON CONFLICT(user_id, chapter_id) DO UPDATE SET
                    status = CASE WHEN reading_progress.status = 'completed'
                                  THEN 'completed' ELSE 'reading' END,
                    reading_percentage = CASE
                        WHEN reading_progress.status = 'completed' THEN 100
                        WHEN excluded.last_read_at >= COALESCE(reading_progress.last_read_at, 0)
                        THEN excluded.reading_percentage
                        ELSE reading_progress.reading_percentage END,
                    scroll_position = CASE
                        WHEN excluded.last_read_at >= COALESCE(reading_progress.last_read_at, 0)
                        THEN excluded.scroll_position
                        ELSE reading_progress.scroll_position END,
                    last_read_at = MAX(COALESCE(reading_progress.last_read_at, 0), excluded.last_read_at)",
            )
            .bind(&update.user_id)
            .bind(update.chapter_id)
            .bind(update.book_id)
            .bind(update.percentage as i64)
            .bind(update.scroll_position)
            .bind(update.read_at)
            .execute(&mut *tx)
            .await?;

            recompute_book_progress(&mut *tx, &update.user_id, update.book_id).await?;
            tx.commit().await?;
            Ok(())
        }
        .boxed()
    }

    fn upsert_completed<'a>(
        &'a self,
        user_id: &'a str,
        chapter_id: i64,
        book_id: i64,
        completed_at: i64,
    ) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                "INSERT INTO reading_progress
                    (user_id, chapter_id, book_id, status, reading_percentage, scroll_position,
                     last_read_at, completed_at)
                 VALUES (?, ?, ?, 'completed', 100, 0, ?, ?)
                 ON CONFLICT(user_id, chapter_id) DO UPDATE SET
                    status = 'completed',
                    reading_percentage = 100,
                    completed_at = COALESCE(reading_progress.completed_at, excluded.completed_at),
                    last_read_at = MAX(COALESCE(reading_progress.last_read_at, 0), excluded.last_read_at)",
            )
            .bind(user_id)
            .bind(chapter_id)
            .bind(book_id)
            .bind(completed_at)
            .bind(completed_at)
            .execute(&mut *tx)
            .await?;

            recompute_book_progress(&mut *tx, user_id, book_id).await?;
            tx.commit().await?;
            Ok(())
        }
        .boxed()
    }

    fn get_progress<'a>(
        &'a self,
        user_id: &'a str,
        chapter_id: i64,
    ) -> BoxFuture<'a, StoreResult<Option<ReadingProgress>>> {
        async move {
            let progress = sqlx::query_as::<_, ReadingProgress>(
                "SELECT * FROM reading_progress WHERE user_id = ? AND chapter_id = ?",
            )
            .bind(user_id)
            .bind(chapter_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(progress)
        }
        .boxed()
    }

    fn book_summary<'a>(
        &'a self,
        user_id: &'a str,
        book_id: i64,
    ) -> BoxFuture<'a, StoreResult<Option<BookProgressSummary>>> {
        async move {
            let summary = sqlx::query_as::<_, BookProgressSummary>(
                "SELECT * FROM book_progress WHERE user_id = ? AND book_id = ?",
            )
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(summary)
        }
        .boxed()
    }

    fn delete_progress<'a>(&'a self, user_id: &'a str, chapter_id: i64) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let mut tx = self.pool.begin().await?;

            // write first, so the transaction never has to upgrade a read snapshot
            let book_id: Option<i64> = sqlx::query_scalar(
                "DELETE FROM reading_progress WHERE user_id = ? AND chapter_id = ? RETURNING book_id",
            )
            .bind(user_id)
            .bind(chapter_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(book_id) = book_id {
                recompute_book_progress(&mut *tx, user_id, book_id).await?;
            }
            tx.commit().await?;
            Ok(())
        }
        .boxed()
    }
}

/// Nearest published chapter of a book in `direction`. Binds `book_id`, then `chapter_number`.
fn adjacent_query(columns: &str, direction: Direction) -> String {
    let (cmp, order) = match direction {
        Direction::Next => (">", "ASC"),
        Direction::Previous => ("<", "DESC"),
    };
    format!(
        "SELECT {} FROM chapters
         WHERE book_id = ? AND published = 1 AND chapter_number {} ?
         ORDER BY chapter_number {} LIMIT 1",
        columns, cmp, order
    )
}

/// Rebuild the `book_progress` row of one user and book from `reading_progress`.
async fn recompute_book_progress(
    conn: &mut SqliteConnection,
    user_id: &str,
    book_id: i64,
) -> StoreResult<()> {
    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE book_id = ? AND published = 1")
            .bind(book_id)
            .fetch_one(&mut *conn)
            .await?;

    let (read, completed, last_read_at): (i64, i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0),
                MAX(last_read_at)
         FROM reading_progress WHERE user_id = ? AND book_id = ?",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_one(&mut *conn)
    .await?;

    if read == 0 {
        sqlx::query("DELETE FROM book_progress WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *conn)
            .await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO book_progress
            (user_id, book_id, total_chapters, chapters_read, chapters_completed,
             progress_percentage, last_read_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id, book_id) DO UPDATE SET
            total_chapters = excluded.total_chapters,
            chapters_read = excluded.chapters_read,
            chapters_completed = excluded.chapters_completed,
            progress_percentage = excluded.progress_percentage,
            last_read_at = excluded.last_read_at",
    )
    .bind(user_id)
    .bind(book_id)
    .bind(total)
    .bind(read)
    .bind(completed)
    .bind(book_percentage(completed, total))
    .bind(last_read_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Completed chapters as a rounded share of published chapters.
pub fn book_percentage(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let pct = (completed as f64 * 100.0 / total as f64).round() as i64;
    pct.clamp(0, 100)
}
