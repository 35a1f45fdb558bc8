//! Content and progress stores
//! The reader only talks to these traits; `SqliteStore` is the bundled backend.

use crate::error::ReaderError;
use crate::models::{Book, BookProgressSummary, Chapter, ChapterRef, ChapterSummary, ReadingProgress};
use crate::reader::navigator::Direction;
use std::future::Future;
use std::pin::Pin;

pub mod cache;
pub mod sqlite;

pub use cache::CachedContentStore;
pub use sqlite::SqliteStore;

/// Boxed future returned by the store traits
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type StoreResult<T> = Result<T, ReaderError>;

/// Read-only access to published books and chapters.
pub trait ContentStore: Send + Sync {
    /// Published chapter with this slug.
    fn chapter_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Chapter>>>;

    /// Nearest published chapter of `book_id` after or before `chapter_number`.
    fn adjacent_chapter<'a>(
        &'a self,
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    ) -> BoxFuture<'a, StoreResult<Option<Chapter>>>;

    /// Like `chapter_by_slug`, returning only the id and revision.
    fn chapter_ref_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>>;

    /// Like `adjacent_chapter`, returning only the id and revision.
    fn adjacent_chapter_ref<'a>(
        &'a self,
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    ) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>>;

    /// Published chapter with this id.
    fn chapter_by_id<'a>(&'a self, chapter_id: i64) -> BoxFuture<'a, StoreResult<Option<Chapter>>>;

    /// Atomic `views + 1` on the chapter.
    fn increment_chapter_views<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    fn book_by_id<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Option<Book>>>;

    fn book_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Book>>>;

    /// Published chapters ordered by chapter number.
    fn list_chapters<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Vec<ChapterSummary>>>;
}

/// One scroll-driven progress write.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub user_id: String,
    pub chapter_id: i64,
    pub book_id: i64,
    pub scroll_position: i64,
    pub percentage: u8,
    /// Event time in Unix millis, captured when the scroll happened
    pub read_at: i64,
}

/// Per-user reading progress.
pub trait ProgressStore: Send + Sync {
    /// Status becomes `reading` unless already `completed`.
    fn upsert_reading<'a>(&'a self, update: &'a ProgressUpdate) -> BoxFuture<'a, StoreResult<()>>;

    fn upsert_completed<'a>(
        &'a self,
        user_id: &'a str,
        chapter_id: i64,
        book_id: i64,
        completed_at: i64,
    ) -> BoxFuture<'a, StoreResult<()>>;

    fn get_progress<'a>(
        &'a self,
        user_id: &'a str,
        chapter_id: i64,
    ) -> BoxFuture<'a, StoreResult<Option<ReadingProgress>>>;

    fn book_summary<'a>(
        &'a self,
        user_id: &'a str,
        book_id: i64,
    ) -> BoxFuture<'a, StoreResult<Option<BookProgressSummary>>>;

    fn delete_progress<'a>(&'a self, user_id: &'a str, chapter_id: i64) -> BoxFuture<'a, StoreResult<()>>;
}
