//! Text helpers for chapter markup

use once_cell::sync::Lazy;
use regex::Regex;

/// Average reading speed used for chapters without a stored read time.
pub const WORDS_PER_MINUTE: usize = 200;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&[#a-zA-Z0-9]+;").unwrap());

/// Drop tags and entities, leaving the visible words.
pub fn strip_markup(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    ENTITY_RE.replace_all(&without_tags, " ").into_owned()
}

pub fn word_count(html: &str) -> usize {
    strip_markup(html).split_whitespace().count()
}

/// Estimated minutes to read `html`, at least one.
pub fn estimate_read_time(html: &str) -> i64 {
    let words = word_count(html);
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i64
}
