//! Shared fixtures for tests

use crate::db;
use crate::store::SqliteStore;
use sqlx::SqlitePool;
use std::path::PathBuf;

pub struct ChapterSeed {
    pub number: i64,
    pub slug: &'static str,
    pub content: String,
    pub content_hi: Option<String>,
    pub image: Option<&'static str>,
    pub published: bool,
}

impl ChapterSeed {
    pub fn published(number: i64, slug: &'static str, content: &str) -> Self {
        Self {
            number,
            slug,
            content: content.to_string(),
            content_hi: None,
            image: None,
            published: true,
        }
    }

    pub fn draft(number: i64, slug: &'static str, content: &str) -> Self {
        Self {
            published: false,
            ..Self::published(number, slug, content)
        }
    }

    pub fn with_image(mut self, url: &'static str) -> Self {
        self.image = Some(url);
        self
    }

    pub fn with_hindi(mut self, content: &str) -> Self {
        self.content_hi = Some(content.to_string());
        self
    }
}

pub async fn memory_pool() -> SqlitePool {
    db::connect("sqlite::memory:").await.unwrap()
}

pub async fn seed_book(pool: &SqlitePool, book_id: i64, slug: &str, chapters: &[ChapterSeed]) {
    sqlx::query(
        "INSERT INTO books (id, title, slug, total_chapters, published) VALUES (?, ?, ?, ?, 1)",
    )
    .bind(book_id)
    .bind(format!("Book {}", slug))
    .bind(slug)
    .bind(chapters.len() as i64)
    .execute(pool)
    .await
    .unwrap();

    for seed in chapters {
        sqlx::query(
            "INSERT INTO chapters
                (book_id, chapter_number, title, slug, content, content_hi, chapter_image, published)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(book_id)
        .bind(seed.number)
        .bind(format!("Adhyay {}", seed.number))
        .bind(seed.slug)
        .bind(&seed.content)
        .bind(&seed.content_hi)
        .bind(seed.image)
        .bind(seed.published)
        .execute(pool)
        .await
        .unwrap();
    }
}

/// Book 1 "leelaayen": chapters 1, 2, 3 (with image), draft 4, 5.
///
/// With a page size of 10 chapter 1 has 3 pages, 2 has 2, 3 has 2 (text + image), 5 has 1.
pub async fn seeded_store() -> SqliteStore {
    let pool = memory_pool().await;
    seed_leelaayen(&pool).await;
    SqliteStore::new(pool)
}

/// The `seeded_store` book in a WAL database file with a multi-connection pool.
/// The files are removed on drop.
pub struct FileStore {
    pub store: SqliteStore,
    path: PathBuf,
}

impl FileStore {
    pub async fn seeded(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "santvaani-{}-{}-{}.db",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let pool = db::connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        seed_leelaayen(&pool).await;
        Self {
            store: SqliteStore::new(pool),
            path,
        }
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

async fn seed_leelaayen(pool: &SqlitePool) {
    seed_book(
        pool,
        1,
        "leelaayen",
        &[
            ChapterSeed::published(1, "pehla-adhyay", &"a".repeat(25))
                .with_hindi(&"अ".repeat(12)),
            ChapterSeed::published(2, "doosra-adhyay", &"b".repeat(20)),
            ChapterSeed::published(3, "teesra-adhyay", &"c".repeat(10)).with_image("leela-3.jpg"),
            ChapterSeed::draft(4, "draft-adhyay", "not yet"),
            ChapterSeed::published(5, "paanchva-adhyay", "eeeee"),
        ],
    )
    .await;
}
