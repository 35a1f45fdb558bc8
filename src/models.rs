use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Content language of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Hindi => "hi",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Locale::English),
            "hi" | "hindi" => Some(Locale::Hindi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub title_hi: Option<String>,
    pub slug: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub author: Option<String>,
    pub total_chapters: i64,
    pub views: i64,
    pub published: bool,
    pub created_at: Option<i64>, // Unix millis
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub title_hi: Option<String>,
    pub slug: String,
    pub content: String, // raw HTML, rendered verbatim
    pub content_hi: Option<String>,
    pub chapter_image: Option<String>,
    pub read_time: Option<i64>, // minutes
    pub views: i64,
    pub published: bool,
}

impl Chapter {
    pub fn title_for(&self, locale: Locale) -> &str {
        localized(&self.title, self.title_hi.as_deref(), locale)
    }

    pub fn content_for(&self, locale: Locale) -> &str {
        localized(&self.content, self.content_hi.as_deref(), locale)
    }

    /// Trailing image URL, ignoring blank values.
    pub fn image(&self) -> Option<&str> {
        self.chapter_image
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn localized<'a>(default: &'a str, hindi: Option<&'a str>, locale: Locale) -> &'a str {
    match (locale, hindi) {
        (Locale::Hindi, Some(text)) if !text.trim().is_empty() => text,
        _ => default,
    }
}

/// Identity and content revision of a published chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow)]
pub struct ChapterRef {
    pub id: i64,
    pub revision: i64,
}

/// Table of contents row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChapterSummary {
    pub id: i64,
    pub chapter_number: i64,
    pub title: String,
    pub title_hi: Option<String>,
    pub slug: String,
    pub read_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ReadingStatus {
    NotStarted,
    Reading,
    Completed,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::NotStarted => "not_started",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReadingProgress {
    pub id: i64,
    pub user_id: String,
    pub chapter_id: i64,
    pub book_id: i64,
    pub status: ReadingStatus,
    pub reading_percentage: i64,
    pub scroll_position: i64,
    pub last_read_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// Per user, per book rollup recomputed on every progress write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BookProgressSummary {
    pub user_id: String,
    pub book_id: i64,
    pub total_chapters: i64,
    pub chapters_read: i64,
    pub chapters_completed: i64,
    pub progress_percentage: i64,
    pub last_read_at: Option<i64>,
}
