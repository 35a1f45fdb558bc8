pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod reader;
pub mod routes;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use config::ReaderConfig;
pub use error::{ReaderError, ReaderErrorCode};
pub use reader::{ChapterNavigator, Page, Paginator, ProgressTracker};
pub use store::{CachedContentStore, ContentStore, ProgressStore, SqliteStore};
