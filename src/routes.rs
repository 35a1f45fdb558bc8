//! Reader paths
//! Chapters are addressed by slug under their book's landing page.

use crate::error::{ReaderError, ReaderErrorCode};

pub const READER_ROOT: &str = "/leelaayen";

/// Landing page of a book, the redirect target for unavailable chapters.
pub fn book_path(book_slug: &str) -> String {
    format!("{}/{}", READER_ROOT, book_slug)
}

pub fn chapter_path(book_slug: &str, chapter_slug: &str) -> String {
    format!("{}/{}/{}", READER_ROOT, book_slug, chapter_slug)
}

/// Where a failed chapter lookup sends the reader. `None` for other errors.
pub fn redirect_for(err: &ReaderError) -> Option<String> {
    match err.code {
        ReaderErrorCode::ChapterNotFound => err.book_slug.as_deref().map(book_path),
        _ => None,
    }
}

/// Split `/leelaayen/{book}/{chapter}` into its slugs.
pub fn parse_chapter_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(READER_ROOT)?.strip_prefix('/')?;
    let mut parts = rest.trim_end_matches('/').split('/');
    let book = parts.next().filter(|s| !s.is_empty())?;
    let chapter = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some((book, chapter))
}
