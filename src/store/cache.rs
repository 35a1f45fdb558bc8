use super::{BoxFuture, ContentStore, StoreResult};
use crate::models::{Book, Chapter, ChapterRef, ChapterSummary};
use crate::reader::navigator::Direction;
use futures::FutureExt;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Memoises chapter rows of an inner store, keyed by id and content revision.
///
/// Every lookup first resolves the chapter against the inner store, so publishing rules
/// and adjacency are always current; only the row itself comes from the cache. An edit
/// bumps the revision and misses. View counts on cached rows can lag; increments always
/// reach the inner store.
pub struct CachedContentStore<S> {
    inner: Arc<S>,
    chapters: Cache<ChapterRef, Chapter>,
}

impl<S: ContentStore> CachedContentStore<S> {
    pub fn new(inner: Arc<S>, ttl: Duration, capacity: u64) -> Self {
        let chapters = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(capacity)
            .build();
        Self { inner, chapters }
    }

    pub async fn invalidate_all(&self) {
        self.chapters.invalidate_all();
        self.chapters.run_pending_tasks().await;
    }

    async fn load(&self, found: Option<ChapterRef>) -> StoreResult<Option<Chapter>> {
        let Some(key) = found else {
            return Ok(None);
        };
        if let Some(chapter) = self.chapters.get(&key).await {
            tracing::debug!(chapter_id = key.id, revision = key.revision, "chapter cache hit");
            return Ok(Some(chapter));
        }

        let chapter = self.inner.chapter_by_id(key.id).await?;
        if let Some(ref chapter) = chapter {
            self.chapters.insert(key, chapter.clone()).await;
        }
        Ok(chapter)
    }
}

impl<S: ContentStore + 'static> ContentStore for CachedContentStore<S> {
    fn chapter_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Chapter>>> {
        async move {
            let found = self.inner.chapter_ref_by_slug(slug).await?;
            self.load(found).await
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
            let found = self
                .inner
                .adjacent_chapter_ref(book_id, chapter_number, direction)
                .await?;
            self.load(found).await
        }
        .boxed()
    }

    fn chapter_ref_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>> {
        self.inner.chapter_ref_by_slug(slug)
    }

    fn adjacent_chapter_ref<'a>(
        &'a self,
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    ) -> BoxFuture<'a, StoreResult<Option<ChapterRef>>> {
        self.inner.adjacent_chapter_ref(book_id, chapter_number, direction)
    }

    fn chapter_by_id<'a>(&'a self, chapter_id: i64) -> BoxFuture<'a, StoreResult<Option<Chapter>>> {
        self.inner.chapter_by_id(chapter_id)
    }

    fn increment_chapter_views<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        self.inner.increment_chapter_views(slug)
    }

    fn book_by_id<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Option<Book>>> {
        self.inner.book_by_id(book_id)
    }

    fn book_by_slug<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, StoreResult<Option<Book>>> {
        self.inner.book_by_slug(slug)
    }

    fn list_chapters<'a>(&'a self, book_id: i64) -> BoxFuture<'a, StoreResult<Vec<ChapterSummary>>> {
        self.inner.list_chapters(book_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Locale;
    use crate::reader::navigator::{ChapterNavigator, Moved};
    use crate::reader::paginator::Paginator;
    use crate::store::SqliteStore;
    use crate::test_utils::seeded_store;

    async fn execute(store: &SqliteStore, sql: &str) {
        sqlx::query(sql).execute(store.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn test_repeat_lookups_hit_the_cache() {
        let store = Arc::new(seeded_store().await);
        let cached = CachedContentStore::new(store.clone(), Duration::from_secs(60), 16);

        let first = cached.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();
        assert_eq!(first.views, 0);

        // views do not bump the revision, so the cached row is served
        store.increment_chapter_views("pehla-adhyay").await.unwrap();
        let second = cached.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();
        assert_eq!(second.views, 0);

        cached.invalidate_all().await;
        let fresh = cached.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();
        assert_eq!(fresh.views, 1);
    }

    #[tokio::test]
    async fn test_content_edit_is_not_served_stale() {
        let store = Arc::new(seeded_store().await);
        let cached = CachedContentStore::new(store.clone(), Duration::from_secs(60), 16);

        cached.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();
        execute(&store, "UPDATE chapters SET title = 'changed' WHERE slug = 'pehla-adhyay'").await;

        let fresh = cached.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();
        assert_eq!(fresh.title, "changed");
    }

    #[tokio::test]
    async fn test_unpublished_after_caching_is_hidden() {
        let store = Arc::new(seeded_store().await);
        let cached = CachedContentStore::new(store.clone(), Duration::from_secs(60), 16);

        assert!(cached.chapter_by_slug("paanchva-adhyay").await.unwrap().is_some());
        assert!(cached.adjacent_chapter(1, 3, Direction::Next).await.unwrap().is_some());

        execute(&store, "UPDATE chapters SET published = 0 WHERE slug = 'paanchva-adhyay'").await;

        assert!(cached.chapter_by_slug("paanchva-adhyay").await.unwrap().is_none());
        assert!(cached.adjacent_chapter(1, 3, Direction::Next).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_navigator_cannot_enter_chapter_unpublished_after_caching() {
        let store = Arc::new(seeded_store().await);
        let cached = Arc::new(CachedContentStore::new(store.clone(), Duration::from_secs(60), 16));

        let mut nav = ChapterNavigator::open(
            cached,
            Paginator::new(10).unwrap(),
            Locale::English,
            "leelaayen",
            "teesra-adhyay",
        )
        .await
        .unwrap();
        nav.go_to_page(1).unwrap();
        assert_eq!(nav.next().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().chapter_number, 5);

        execute(&store, "UPDATE chapters SET published = 0 WHERE chapter_number = 5").await;

        assert_eq!(nav.previous().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().chapter_number, 3);
        assert_eq!(nav.next().await.unwrap(), Moved::Stayed);
        assert_eq!(nav.chapter().chapter_number, 3);
    }

    #[tokio::test]
    async fn test_missing_chapters_are_not_cached() {
        let store = Arc::new(seeded_store().await);
        let cached = CachedContentStore::new(store.clone(), Duration::from_secs(60), 16);

        assert!(cached.chapter_by_slug("draft-adhyay").await.unwrap().is_none());
        execute(&store, "UPDATE chapters SET published = 1 WHERE slug = 'draft-adhyay'").await;
        assert!(cached.chapter_by_slug("draft-adhyay").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_adjacent_lookup_per_direction() {
        let store = Arc::new(seeded_store().await);
        let cached = CachedContentStore::new(store, Duration::from_secs(60), 16);

        let next = cached.adjacent_chapter(1, 2, Direction::Next).await.unwrap().unwrap();
        let prev = cached.adjacent_chapter(1, 2, Direction::Previous).await.unwrap().unwrap();
        assert_eq!(next.chapter_number, 3);
        assert_eq!(prev.chapter_number, 1);
    }
}
