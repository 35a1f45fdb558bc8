//! Book reader core: pagination, chapter navigation and progress tracking

pub mod navigator;
pub mod paginator;
pub mod progress;
pub mod text;

pub use navigator::{ChapterNavigator, ChapterView, Direction, LoadTicket, Moved, OpenOutcome, ReaderPosition, ReaderState};
pub use paginator::{Page, Paginator, SplitPolicy, DEFAULT_PAGE_SIZE};
pub use progress::{calculate_percentage, ProgressTracker, ScrollMetrics};
