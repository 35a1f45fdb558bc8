//! Database connection and schema

use crate::error::ReaderError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Open the pool for `database_url` and make sure the schema exists.
pub async fn connect(database_url: &str) -> Result<SqlitePool, ReaderError> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let mut opts = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        opts = opts.journal_mode(SqliteJournalMode::Wal);
    }

    // every connection to :memory: is its own database, so keep exactly one alive
    let pool_opts = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };
    let pool = pool_opts.connect_with(opts).await?;

    init_database(&pool).await?;
    tracing::info!(database_url, "database ready");
    Ok(pool)
}

/// Create tables and indexes. Safe to run on every start.
pub async fn init_database(pool: &SqlitePool) -> Result<(), ReaderError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            title_hi TEXT,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            cover_image TEXT,
            author TEXT,
            total_chapters INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            published INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            chapter_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            title_hi TEXT,
            slug TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL DEFAULT '',
            content_hi TEXT,
            chapter_image TEXT,
            read_time INTEGER,
            views INTEGER NOT NULL DEFAULT 0,
            published INTEGER NOT NULL DEFAULT 0,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER DEFAULT (CAST(strftime('%s', 'now') AS INTEGER) * 1000),
            UNIQUE (book_id, chapter_number),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS reading_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            chapter_id INTEGER NOT NULL,
            book_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'reading',
            reading_percentage INTEGER NOT NULL DEFAULT 0,
            scroll_position INTEGER NOT NULL DEFAULT 0,
            last_read_at INTEGER,
            completed_at INTEGER,
            UNIQUE (user_id, chapter_id),
            FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS book_progress (
            user_id TEXT NOT NULL,
            book_id INTEGER NOT NULL,
            total_chapters INTEGER NOT NULL DEFAULT 0,
            chapters_read INTEGER NOT NULL DEFAULT 0,
            chapters_completed INTEGER NOT NULL DEFAULT 0,
            progress_percentage INTEGER NOT NULL DEFAULT 0,
            last_read_at INTEGER,
            PRIMARY KEY (user_id, book_id)
        )",
    )
    .execute(pool)
    .await?;

    // Any edit to what a reader sees bumps the revision; view counts do not.
    sqlx::query(
        "CREATE TRIGGER IF NOT EXISTS trg_chapters_revision
         AFTER UPDATE OF title, title_hi, content, content_hi, chapter_image, read_time ON chapters
         BEGIN
            UPDATE chapters SET revision = revision + 1 WHERE id = NEW.id;
         END",
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chapters_book_number ON chapters(book_id, published, chapter_number)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_user_book ON reading_progress(user_id, book_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
