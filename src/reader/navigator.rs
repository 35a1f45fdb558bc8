//! Chapter navigation
//! Page turns inside a chapter and crossing into the adjacent published chapter.

use crate::error::ReaderError;
use crate::models::{Book, Chapter, ChapterSummary, Locale};
use crate::reader::paginator::{Page, Paginator};
use crate::reader::text::estimate_read_time;
use crate::routes;
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Next,
    Previous,
}

/// What a page turn does, decided from the position alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stay in the chapter, move to this page
    Page(usize),
    /// Leave the chapter; the adjacent one may not exist
    CrossChapter(Direction),
}

pub fn plan_step(page_index: usize, total_pages: usize, direction: Direction) -> Step {
    match direction {
        Direction::Next if page_index + 1 < total_pages => Step::Page(page_index + 1),
        Direction::Previous if page_index > 0 => Step::Page(page_index - 1),
        _ => Step::CrossChapter(direction),
    }
}

/// Page to land on when entering a chapter while moving in `direction`.
pub fn entry_page(direction: Direction, total_pages: usize) -> usize {
    match direction {
        Direction::Next => 0,
        Direction::Previous => total_pages.saturating_sub(1),
    }
}

/// A chapter together with its pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterView {
    pub chapter: Chapter,
    pub locale: Locale,
    pub pages: Vec<Page>,
}

impl ChapterView {
    pub fn build(chapter: Chapter, paginator: &Paginator, locale: Locale) -> Self {
        let pages = paginator.paginate(chapter.content_for(locale), chapter.image());
        Self {
            chapter,
            locale,
            pages,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn title(&self) -> &str {
        self.chapter.title_for(self.locale)
    }

    /// Stored read time, or an estimate from the content.
    pub fn read_time(&self) -> i64 {
        self.chapter
            .read_time
            .unwrap_or_else(|| estimate_read_time(self.chapter.content_for(self.locale)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReaderPosition {
    pub chapter_id: i64,
    pub chapter_number: i64,
    pub page_index: usize,
    pub total_pages: usize,
}

/// `(chapter, page index, pages)` of one reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderState {
    pub view: ChapterView,
    pub page_index: usize,
}

impl ReaderState {
    pub fn new(view: ChapterView, page_index: usize) -> Self {
        Self { view, page_index }
    }

    pub fn position(&self) -> ReaderPosition {
        ReaderPosition {
            chapter_id: self.view.chapter.id,
            chapter_number: self.view.chapter.chapter_number,
            page_index: self.page_index,
            total_pages: self.view.total_pages(),
        }
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.view.pages.get(self.page_index)
    }

    pub fn plan(&self, direction: Direction) -> Step {
        plan_step(self.page_index, self.view.total_pages(), direction)
    }
}

/// Result of a navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moved {
    Page,
    Chapter,
    /// Boundary of the book, or a superseded load
    Stayed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    Slug(String),
    Adjacent {
        book_id: i64,
        chapter_number: i64,
        direction: Direction,
    },
}

/// Handle for one chapter fetch. Only the most recently issued ticket is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    pub target: LoadTarget,
}

impl LoadTicket {
    fn entry_direction(&self) -> Direction {
        match self.target {
            LoadTarget::Adjacent { direction, .. } => direction,
            LoadTarget::Slug(_) => Direction::Next,
        }
    }

    fn matches(&self, chapter: &Chapter) -> bool {
        match &self.target {
            LoadTarget::Slug(slug) => chapter.slug == *slug,
            LoadTarget::Adjacent {
                book_id,
                chapter_number,
                direction,
            } => {
                chapter.book_id == *book_id
                    && match direction {
                        Direction::Next => chapter.chapter_number > *chapter_number,
                        Direction::Previous => chapter.chapter_number < *chapter_number,
                    }
            }
        }
    }
}

/// Either a reader, or where to send the user instead.
pub enum OpenOutcome<S> {
    Reading(ChapterNavigator<S>),
    Redirect { location: String },
}

/// Reader over one book, positioned on a chapter page.
pub struct ChapterNavigator<S> {
    store: Arc<S>,
    paginator: Paginator,
    book: Book,
    state: ReaderState,
    latest_ticket: u64,
}

impl<S: ContentStore> ChapterNavigator<S> {
    /// Load the published chapter `chapter_slug` of book `book_slug` at its first page.
    ///
    /// A chapter that exists but belongs to another book counts as not found.
    pub async fn open(
        store: Arc<S>,
        paginator: Paginator,
        locale: Locale,
        book_slug: &str,
        chapter_slug: &str,
    ) -> Result<Self, ReaderError> {
        let book = store
            .book_by_slug(book_slug)
            .await?
            .ok_or_else(|| ReaderError::book_not_found(book_slug))?;
        let chapter = store
            .chapter_by_slug(chapter_slug)
            .await?
            .filter(|chapter| chapter.book_id == book.id)
            .ok_or_else(|| ReaderError::chapter_not_found(book_slug, chapter_slug))?;

        let view = ChapterView::build(chapter, &paginator, locale);
        let navigator = Self {
            store,
            paginator,
            book,
            state: ReaderState::new(view, 0),
            latest_ticket: 0,
        };
        navigator.record_view().await;
        tracing::info!(
            book = %navigator.book.slug,
            chapter = %chapter_slug,
            pages = navigator.state.view.total_pages(),
            "chapter opened"
        );
        Ok(navigator)
    }

    /// Like [`open`](Self::open), turning a missing chapter into a redirect to the book page.
    pub async fn open_route(
        store: Arc<S>,
        paginator: Paginator,
        locale: Locale,
        book_slug: &str,
        chapter_slug: &str,
    ) -> Result<OpenOutcome<S>, ReaderError> {
        match Self::open(store, paginator, locale, book_slug, chapter_slug).await {
            Ok(navigator) => Ok(OpenOutcome::Reading(navigator)),
            Err(err) if err.code == crate::error::ReaderErrorCode::ChapterNotFound => {
                let location = routes::redirect_for(&err)
                    .unwrap_or_else(|| routes::book_path(book_slug));
                tracing::info!(chapter = %chapter_slug, %location, "chapter unavailable, redirecting");
                Ok(OpenOutcome::Redirect { location })
            }
            Err(err) => Err(err),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn chapter(&self) -> &Chapter {
        &self.state.view.chapter
    }

    pub fn view(&self) -> &ChapterView {
        &self.state.view
    }

    pub fn position(&self) -> ReaderPosition {
        self.state.position()
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.state.current_page()
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn book_slug(&self) -> &str {
        &self.book.slug
    }

    pub fn locale(&self) -> Locale {
        self.state.view.locale
    }

    /// Path of the chapter currently shown.
    pub fn path(&self) -> String {
        routes::chapter_path(&self.book.slug, &self.state.view.chapter.slug)
    }

    /// Re-paginate the current chapter in `locale`, keeping the page index when it still exists.
    pub fn set_locale(&mut self, locale: Locale) {
        if locale == self.locale() {
            return;
        }
        let chapter = self.state.view.chapter.clone();
        let view = ChapterView::build(chapter, &self.paginator, locale);
        let last = view.total_pages().saturating_sub(1);
        let page_index = self.state.page_index.min(last);
        self.state = ReaderState::new(view, page_index);
    }

    pub async fn next(&mut self) -> Result<Moved, ReaderError> {
        self.turn(Direction::Next).await
    }

    pub async fn previous(&mut self) -> Result<Moved, ReaderError> {
        self.turn(Direction::Previous).await
    }

    async fn turn(&mut self, direction: Direction) -> Result<Moved, ReaderError> {
        match self.state.plan(direction) {
            Step::Page(index) => {
                self.state.page_index = index;
                tracing::debug!(page = index, ?direction, "page turned");
                Ok(Moved::Page)
            }
            Step::CrossChapter(direction) => {
                let ticket = self.request_adjacent(direction);
                match Self::fetch(&self.store, &ticket).await? {
                    Some(chapter) => {
                        if self.apply_load(&ticket, chapter).await {
                            Ok(Moved::Chapter)
                        } else {
                            Ok(Moved::Stayed)
                        }
                    }
                    None => {
                        tracing::debug!(?direction, "no adjacent chapter");
                        Ok(Moved::Stayed)
                    }
                }
            }
        }
    }

    /// Jump to a page of the current chapter.
    pub fn go_to_page(&mut self, index: usize) -> Result<(), ReaderError> {
        let total = self.state.view.total_pages();
        if index >= total {
            return Err(ReaderError::invalid_parameter(format!(
                "page {} does not exist ({} pages)",
                index, total
            )));
        }
        self.state.page_index = index;
        Ok(())
    }

    /// Jump to another published chapter, e.g. from the table of contents.
    pub async fn go_to_chapter(&mut self, slug: &str) -> Result<Moved, ReaderError> {
        let ticket = self.request_slug(slug);
        let book_id = self.book.id;
        let chapter = Self::fetch(&self.store, &ticket)
            .await?
            .filter(|chapter| chapter.book_id == book_id)
            .ok_or_else(|| ReaderError::chapter_not_found(&self.book.slug, slug))?;
        if self.apply_load(&ticket, chapter).await {
            Ok(Moved::Chapter)
        } else {
            Ok(Moved::Stayed)
        }
    }

    pub async fn table_of_contents(&self) -> Result<Vec<ChapterSummary>, ReaderError> {
        self.store.list_chapters(self.book.id).await
    }

    /// Issue a ticket for the chapter adjacent to the current one. Supersedes earlier tickets.
    pub fn request_adjacent(&mut self, direction: Direction) -> LoadTicket {
        let chapter = &self.state.view.chapter;
        let target = LoadTarget::Adjacent {
            book_id: chapter.book_id,
            chapter_number: chapter.chapter_number,
            direction,
        };
        self.issue(target)
    }

    pub fn request_slug(&mut self, slug: &str) -> LoadTicket {
        self.issue(LoadTarget::Slug(slug.to_string()))
    }

    fn issue(&mut self, target: LoadTarget) -> LoadTicket {
        self.latest_ticket += 1;
        LoadTicket {
            seq: self.latest_ticket,
            target,
        }
    }

    /// Resolve a ticket. Does not touch navigator state, so it can run detached.
    pub async fn fetch(store: &S, ticket: &LoadTicket) -> Result<Option<Chapter>, ReaderError> {
        match &ticket.target {
            LoadTarget::Slug(slug) => store.chapter_by_slug(slug).await,
            LoadTarget::Adjacent {
                book_id,
                chapter_number,
                direction,
            } => {
                store
                    .adjacent_chapter(*book_id, *chapter_number, *direction)
                    .await
            }
        }
    }

    /// Enter `chapter` if `ticket` is still the latest one and the chapter is what it asked for.
    ///
    /// Returns false when the result was discarded.
    pub async fn apply_load(&mut self, ticket: &LoadTicket, chapter: Chapter) -> bool {
        if ticket.seq != self.latest_ticket {
            tracing::debug!(
                ticket = ticket.seq,
                latest = self.latest_ticket,
                "discarding superseded chapter load"
            );
            return false;
        }
        if !ticket.matches(&chapter) {
            tracing::warn!(chapter = %chapter.slug, wanted = ?ticket.target, "chapter does not match load target");
            return false;
        }

        let view = ChapterView::build(chapter, &self.paginator, self.locale());
        let page_index = entry_page(ticket.entry_direction(), view.total_pages());
        self.state = ReaderState::new(view, page_index);
        self.record_view().await;

        tracing::info!(
            chapter = %self.state.view.chapter.slug,
            page = page_index,
            "entered chapter"
        );
        true
    }

    async fn record_view(&self) {
        let slug = &self.state.view.chapter.slug;
        if let Err(e) = self.store.increment_chapter_views(slug).await {
            tracing::warn!(chapter = %slug, error = %e, "failed to record chapter view");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::test_utils::{memory_pool, seed_book, seeded_store, ChapterSeed};

    async fn open_at(slug: &str) -> ChapterNavigator<SqliteStore> {
        let store = Arc::new(seeded_store().await);
        ChapterNavigator::open(
            store,
            Paginator::new(10).unwrap(),
            Locale::English,
            "leelaayen",
            slug,
        )
        .await
        .unwrap()
    }

    async fn views(store: &SqliteStore, slug: &str) -> i64 {
        sqlx::query_scalar("SELECT views FROM chapters WHERE slug = ?")
            .bind(slug)
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[test]
    fn test_plan_step() {
        assert_eq!(plan_step(0, 3, Direction::Next), Step::Page(1));
        assert_eq!(plan_step(2, 3, Direction::Next), Step::CrossChapter(Direction::Next));
        assert_eq!(plan_step(1, 3, Direction::Previous), Step::Page(0));
        assert_eq!(
            plan_step(0, 3, Direction::Previous),
            Step::CrossChapter(Direction::Previous)
        );
        assert_eq!(plan_step(0, 0, Direction::Next), Step::CrossChapter(Direction::Next));
    }

    #[test]
    fn test_entry_page() {
        assert_eq!(entry_page(Direction::Next, 4), 0);
        assert_eq!(entry_page(Direction::Previous, 4), 3);
        assert_eq!(entry_page(Direction::Previous, 0), 0);
    }

    #[tokio::test]
    async fn test_previous_on_first_page_of_book_is_noop() {
        let mut nav = open_at("pehla-adhyay").await;
        let before = nav.state().clone();

        assert_eq!(nav.previous().await.unwrap(), Moved::Stayed);
        assert_eq!(nav.state(), &before);
    }

    #[tokio::test]
    async fn test_next_on_last_page_of_book_is_noop() {
        let mut nav = open_at("paanchva-adhyay").await;
        assert_eq!(nav.position().total_pages, 1);
        let before = nav.state().clone();

        assert_eq!(nav.next().await.unwrap(), Moved::Stayed);
        assert_eq!(nav.state(), &before);
    }

    #[tokio::test]
    async fn test_next_walks_pages_then_crosses_chapter() {
        let mut nav = open_at("pehla-adhyay").await;
        assert_eq!(nav.position().total_pages, 3);

        assert_eq!(nav.next().await.unwrap(), Moved::Page);
        assert_eq!(nav.next().await.unwrap(), Moved::Page);
        assert_eq!(nav.position().page_index, 2);

        assert_eq!(nav.next().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().slug, "doosra-adhyay");
        assert_eq!(nav.position().page_index, 0);
    }

    #[tokio::test]
    async fn test_previous_lands_on_last_page_of_previous_chapter() {
        let mut nav = open_at("doosra-adhyay").await;

        assert_eq!(nav.previous().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().slug, "pehla-adhyay");
        assert_eq!(nav.position().page_index, 2);
    }

    #[tokio::test]
    async fn test_navigation_skips_unpublished_chapter() {
        let mut nav = open_at("teesra-adhyay").await;
        nav.go_to_page(1).unwrap();
        assert!(nav.current_page().unwrap().is_image());

        assert_eq!(nav.next().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().chapter_number, 5);

        assert_eq!(nav.previous().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().chapter_number, 3);
        assert_eq!(nav.position().page_index, 1);
    }

    #[tokio::test]
    async fn test_crossing_into_next_chapter_counts_one_view() {
        let pool = memory_pool().await;
        seed_book(
            &pool,
            7,
            "teen-adhyay",
            &[
                ChapterSeed::published(1, "ek", &"1".repeat(10)),
                ChapterSeed::published(2, "do", &"2".repeat(30)),
                ChapterSeed::published(3, "teen", &"3".repeat(10)),
            ],
        )
        .await;
        let store = Arc::new(SqliteStore::new(pool));

        let mut nav = ChapterNavigator::open(
            store.clone(),
            Paginator::new(10).unwrap(),
            Locale::English,
            "teen-adhyay",
            "do",
        )
        .await
        .unwrap();
        nav.go_to_page(2).unwrap();
        assert_eq!(views(&store, "teen").await, 0);

        assert_eq!(nav.next().await.unwrap(), Moved::Chapter);
        assert_eq!(nav.chapter().slug, "teen");
        assert_eq!(nav.position().page_index, 0);
        assert_eq!(views(&store, "teen").await, 1);
    }

    #[tokio::test]
    async fn test_page_turns_do_not_count_views() {
        let mut nav = open_at("pehla-adhyay").await;
        let store = nav.store().clone();
        assert_eq!(views(&store, "pehla-adhyay").await, 1);

        nav.next().await.unwrap();
        nav.next().await.unwrap();
        nav.previous().await.unwrap();
        assert_eq!(views(&store, "pehla-adhyay").await, 1);
    }

    #[tokio::test]
    async fn test_missing_chapter_redirects_to_book() {
        let store = Arc::new(seeded_store().await);
        for slug in ["no-such-chapter", "draft-adhyay"] {
            let outcome = ChapterNavigator::open_route(
                store.clone(),
                Paginator::default(),
                Locale::English,
                "leelaayen",
                slug,
            )
            .await
            .unwrap();
            match outcome {
                OpenOutcome::Redirect { location } => assert_eq!(location, "/leelaayen/leelaayen"),
                OpenOutcome::Reading(_) => panic!("expected redirect for {}", slug),
            }
        }
    }

    #[tokio::test]
    async fn test_open_missing_chapter_is_not_found() {
        let store = Arc::new(seeded_store().await);
        let err = ChapterNavigator::open(
            store,
            Paginator::default(),
            Locale::English,
            "leelaayen",
            "missing",
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.code, crate::error::ReaderErrorCode::ChapterNotFound);
    }

    #[tokio::test]
    async fn test_chapter_of_another_book_redirects() {
        let store = Arc::new(seeded_store().await);
        seed_book(
            store.pool(),
            2,
            "doosri-pustak",
            &[ChapterSeed::published(1, "doosri-1", "other book")],
        )
        .await;

        let outcome = ChapterNavigator::open_route(
            store,
            Paginator::default(),
            Locale::English,
            "leelaayen",
            "doosri-1",
        )
        .await
        .unwrap();
        assert!(matches!(outcome, OpenOutcome::Redirect { .. }));
    }

    #[tokio::test]
    async fn test_unknown_book_is_an_error() {
        let store = Arc::new(seeded_store().await);
        let result = ChapterNavigator::open_route(
            store,
            Paginator::default(),
            Locale::English,
            "no-such-book",
            "pehla-adhyay",
        )
        .await;
        match result {
            Err(err) => assert_eq!(err.code, crate::error::ReaderErrorCode::BookNotFound),
            Ok(_) => panic!("expected book not found"),
        }
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let mut nav = open_at("doosra-adhyay").await;
        let store = nav.store().clone();

        let stale = nav.request_adjacent(Direction::Previous);
        let fresh = nav.request_adjacent(Direction::Next);

        let stale_chapter = ChapterNavigator::<SqliteStore>::fetch(&store, &stale).await.unwrap().unwrap();
        let fresh_chapter = ChapterNavigator::<SqliteStore>::fetch(&store, &fresh).await.unwrap().unwrap();

        assert!(!nav.apply_load(&stale, stale_chapter).await);
        assert_eq!(nav.chapter().slug, "doosra-adhyay");

        assert!(nav.apply_load(&fresh, fresh_chapter).await);
        assert_eq!(nav.chapter().slug, "teesra-adhyay");
    }

    #[tokio::test]
    async fn test_mismatched_chapter_is_discarded() {
        let mut nav = open_at("doosra-adhyay").await;
        let store = nav.store().clone();
        let other = store.chapter_by_slug("pehla-adhyay").await.unwrap().unwrap();

        let ticket = nav.request_slug("teesra-adhyay");
        assert!(!nav.apply_load(&ticket, other).await);
        assert_eq!(nav.chapter().slug, "doosra-adhyay");
    }

    #[tokio::test]
    async fn test_go_to_chapter_and_table_of_contents() {
        let mut nav = open_at("pehla-adhyay").await;
        assert_eq!(nav.go_to_chapter("paanchva-adhyay").await.unwrap(), Moved::Chapter);
        assert_eq!(nav.path(), "/leelaayen/leelaayen/paanchva-adhyay");

        assert!(nav.go_to_chapter("draft-adhyay").await.unwrap_err().is_not_found());

        let toc = nav.table_of_contents().await.unwrap();
        assert_eq!(toc.len(), 4);
    }

    #[tokio::test]
    async fn test_go_to_page_out_of_range() {
        let mut nav = open_at("doosra-adhyay").await;
        assert!(nav.go_to_page(1).is_ok());
        assert!(nav.go_to_page(2).is_err());
        assert_eq!(nav.position().page_index, 1);
    }

    #[tokio::test]
    async fn test_hindi_locale_paginates_localized_content() {
        let mut nav = open_at("pehla-adhyay").await;
        nav.go_to_page(2).unwrap();

        nav.set_locale(Locale::Hindi);
        assert_eq!(nav.position().total_pages, 2);
        assert_eq!(nav.position().page_index, 1);
        assert_eq!(nav.current_page().unwrap().text(), Some("अअ"));

        // no Hindi text for chapter 2, falls back to the default content
        nav.next().await.unwrap();
        assert_eq!(nav.chapter().slug, "doosra-adhyay");
        assert_eq!(nav.locale(), Locale::Hindi);
        assert_eq!(nav.position().total_pages, 2);
    }

    #[tokio::test]
    async fn test_read_time_falls_back_to_estimate() {
        let nav = open_at("pehla-adhyay").await;
        assert_eq!(nav.view().read_time(), 1);
    }
}
