//! Reader error type

use serde::{Deserialize, Serialize};

/// Error raised by the reader core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderError {
    pub code: ReaderErrorCode,
    pub message: String,
    pub details: Option<String>,
    /// Slug of the book a failed chapter lookup belongs to, used for the redirect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_slug: Option<String>,
}

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderErrorCode {
    ChapterNotFound,
    BookNotFound,
    InvalidParameter,
    Database,
    Config,
    Io,
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReaderError {}

impl ReaderError {
    pub fn new(code: ReaderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            book_slug: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Chapter slug is unknown or the chapter is not published.
    pub fn chapter_not_found(book_slug: &str, chapter_slug: &str) -> Self {
        let mut err = Self::new(
            ReaderErrorCode::ChapterNotFound,
            format!("chapter not found: {}", chapter_slug),
        );
        err.book_slug = Some(book_slug.to_string());
        err
    }

    pub fn book_not_found(book: impl std::fmt::Display) -> Self {
        Self::new(
            ReaderErrorCode::BookNotFound,
            format!("book not found: {}", book),
        )
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorCode::InvalidParameter, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ReaderErrorCode::Config, message)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ReaderErrorCode::ChapterNotFound | ReaderErrorCode::BookNotFound
        )
    }
}

impl From<sqlx::Error> for ReaderError {
    fn from(err: sqlx::Error) -> Self {
        ReaderError::new(ReaderErrorCode::Database, err.to_string())
    }
}

impl From<std::io::Error> for ReaderError {
    fn from(err: std::io::Error) -> Self {
        ReaderError::new(ReaderErrorCode::Io, err.to_string())
    }
}

impl From<serde_json::Error> for ReaderError {
    fn from(err: serde_json::Error) -> Self {
        ReaderError::new(ReaderErrorCode::Config, format!("invalid config file: {}", err))
    }
}
