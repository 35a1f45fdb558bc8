//! Reading progress
//! Scroll metrics to percentage, and best-effort, in-order persistence of reading state.

use crate::models::{BookProgressSummary, ReadingProgress};
use crate::store::{ProgressStore, ProgressUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Scroll metrics of the reading surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn percentage(&self) -> u8 {
        calculate_percentage(self.scroll_top, self.scroll_height, self.client_height)
    }
}

/// Percentage of the scrollable range already scrolled, in `0..=100`.
///
/// Content that fits without scrolling counts as fully read.
pub fn calculate_percentage(scroll_top: f64, scroll_height: f64, client_height: f64) -> u8 {
    if scroll_height <= client_height {
        return 100;
    }
    let pct = (scroll_top / (scroll_height - client_height) * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Resolves once a queued write has been applied (or dropped after logging).
pub type WriteHandle = oneshot::Receiver<()>;

enum Write {
    Reading(ProgressUpdate),
    Completed {
        chapter_id: i64,
        book_id: i64,
        completed_at: i64,
    },
    Reset {
        chapter_id: i64,
    },
    /// Reading update, followed by completion when the threshold was reached.
    Scroll {
        update: ProgressUpdate,
        completes: bool,
    },
    /// No-op, acknowledged once every earlier write is done.
    Barrier,
}

struct Job {
    write: Write,
    done: oneshot::Sender<()>,
}

/// Persists one user's progress without ever blocking or failing the reader.
///
/// Writes are queued to a single background task and applied in the order they were
/// issued; failures are logged and dropped. The returned handles may be ignored.
/// Clones share the queue.
pub struct ProgressTracker<P> {
    store: Arc<P>,
    user_id: String,
    completion_threshold: u8,
    writes: mpsc::UnboundedSender<Job>,
}

impl<P> Clone for ProgressTracker<P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            user_id: self.user_id.clone(),
            completion_threshold: self.completion_threshold,
            writes: self.writes.clone(),
        }
    }
}

impl<P: ProgressStore + 'static> ProgressTracker<P> {
    /// Must be called inside a tokio runtime; spawns the writer task.
    pub fn new(store: Arc<P>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let (writes, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Self::writer(store.clone(), user_id.clone(), receiver));
        Self {
            store,
            user_id,
            completion_threshold: 100,
            writes,
        }
    }

    /// Scroll percentage at or above which `record_scroll` also marks the chapter completed.
    pub fn with_completion_threshold(mut self, threshold: u8) -> Self {
        self.completion_threshold = threshold.min(100);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn mark_reading(
        &self,
        chapter_id: i64,
        book_id: i64,
        scroll_position: i64,
        percentage: u8,
    ) -> WriteHandle {
        let update = self.update(chapter_id, book_id, scroll_position, percentage);
        self.enqueue(Write::Reading(update))
    }

    pub fn mark_completed(&self, chapter_id: i64, book_id: i64) -> WriteHandle {
        self.enqueue(Write::Completed {
            chapter_id,
            book_id,
            completed_at: now_millis(),
        })
    }

    /// Forget the chapter's progress, back to not started.
    pub fn reset(&self, chapter_id: i64) -> WriteHandle {
        self.enqueue(Write::Reset { chapter_id })
    }

    /// Handle a scroll event: save the percentage and complete the chapter at the threshold.
    pub fn record_scroll(
        &self,
        chapter_id: i64,
        book_id: i64,
        metrics: ScrollMetrics,
    ) -> (u8, WriteHandle) {
        let percentage = metrics.percentage();
        let update = self.update(chapter_id, book_id, metrics.scroll_top.max(0.0) as i64, percentage);
        let completes = percentage >= self.completion_threshold;
        tracing::debug!(chapter_id, percentage, completes, "scroll recorded");
        (percentage, self.enqueue(Write::Scroll { update, completes }))
    }

    /// Wait until every write issued so far has been applied.
    pub async fn flush(&self) {
        let _ = self.enqueue(Write::Barrier).await;
    }

    /// Stored progress, `None` when missing or unreadable. Sees all earlier writes.
    pub async fn progress(&self, chapter_id: i64) -> Option<ReadingProgress> {
        self.flush().await;
        match self.store.get_progress(&self.user_id, chapter_id).await {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(chapter_id, error = %e, "failed to load reading progress");
                None
            }
        }
    }

    pub async fn book_summary(&self, book_id: i64) -> Option<BookProgressSummary> {
        self.flush().await;
        match self.store.book_summary(&self.user_id, book_id).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(book_id, error = %e, "failed to load book progress");
                None
            }
        }
    }

    fn enqueue(&self, write: Write) -> WriteHandle {
        let (done, handle) = oneshot::channel();
        if self.writes.send(Job { write, done }).is_err() {
            tracing::warn!(user_id = %self.user_id, "progress writer has stopped, write dropped");
        }
        handle
    }

    fn update(&self, chapter_id: i64, book_id: i64, scroll_position: i64, percentage: u8) -> ProgressUpdate {
        ProgressUpdate {
            user_id: self.user_id.clone(),
            chapter_id,
            book_id,
            scroll_position,
            percentage: percentage.min(100),
            read_at: now_millis(),
        }
    }

    /// Applies queued writes one at a time until every sender is dropped.
    async fn writer(store: Arc<P>, user_id: String, mut receiver: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = receiver.recv().await {
            Self::apply(store.as_ref(), &user_id, job.write).await;
            let _ = job.done.send(());
        }
        tracing::debug!(user_id = %user_id, "progress writer finished");
    }

    async fn apply(store: &P, user_id: &str, write: Write) {
        match write {
            Write::Reading(update) => save_reading(store, &update).await,
            Write::Completed {
                chapter_id,
                book_id,
                completed_at,
            } => save_completed(store, user_id, chapter_id, book_id, completed_at).await,
            Write::Reset { chapter_id } => {
                if let Err(e) = store.delete_progress(user_id, chapter_id).await {
                    tracing::warn!(chapter_id, error = %e, "failed to reset chapter progress");
                }
            }
            Write::Scroll { update, completes } => {
                save_reading(store, &update).await;
                if completes {
                    save_completed(store, user_id, update.chapter_id, update.book_id, update.read_at)
                        .await;
                }
            }
            Write::Barrier => {}
        }
    }
}

async fn save_reading<P: ProgressStore>(store: &P, update: &ProgressUpdate) {
    if let Err(e) = store.upsert_reading(update).await {
        tracing::warn!(chapter_id = update.chapter_id, error = %e, "failed to save reading progress");
    }
}

async fn save_completed<P: ProgressStore>(
    store: &P,
    user_id: &str,
    chapter_id: i64,
    book_id: i64,
    completed_at: i64,
) {
    if let Err(e) = store
        .upsert_completed(user_id, chapter_id, book_id, completed_at)
        .await
    {
        tracing::warn!(chapter_id, error = %e, "failed to mark chapter completed");
    }
}
