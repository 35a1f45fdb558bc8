//! Line-driven reading session
//! Drives a navigator and a progress tracker from text commands (one per line).

use crate::error::ReaderError;
use crate::models::Locale;
use crate::reader::navigator::{ChapterNavigator, Moved};
use crate::reader::paginator::Page;
use crate::reader::progress::{ProgressTracker, ScrollMetrics};
use crate::routes;
use crate::store::{ContentStore, ProgressStore};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const HELP: &str = "commands: next (n), prev (p), page <n>, goto <chapter-slug>, \
scroll <top> <height> <client>, complete, reset, progress, summary, toc, locale <en|hi>, help, quit (q)";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Next,
    Previous,
    /// 1-based page number
    Page(usize),
    Goto(String),
    Scroll(ScrollMetrics),
    Complete,
    Reset,
    Progress,
    Summary,
    Toc,
    Locale(Locale),
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = ReaderError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| ReaderError::invalid_parameter("empty command"))?;
        let args: Vec<&str> = parts.collect();

        let number = |raw: &str| -> Result<f64, ReaderError> {
            raw.parse::<f64>()
                .map_err(|_| ReaderError::invalid_parameter(format!("not a number: {}", raw)))
        };

        let command = match (name.to_lowercase().as_str(), args.as_slice()) {
            ("n" | "next", []) => SessionCommand::Next,
            ("p" | "prev" | "previous", []) => SessionCommand::Previous,
            ("page", [n]) => {
                let page = n
                    .parse::<usize>()
                    .ok()
                    .filter(|page| *page > 0)
                    .ok_or_else(|| ReaderError::invalid_parameter(format!("bad page number: {}", n)))?;
                SessionCommand::Page(page)
            }
            ("goto", [slug]) => SessionCommand::Goto(slug.to_string()),
            ("scroll", [top, height, client]) => SessionCommand::Scroll(ScrollMetrics::new(
                number(top)?,
                number(height)?,
                number(client)?,
            )),
            ("complete", []) => SessionCommand::Complete,
            ("reset", []) => SessionCommand::Reset,
            ("progress", []) => SessionCommand::Progress,
            ("summary", []) => SessionCommand::Summary,
            ("toc", []) => SessionCommand::Toc,
            ("locale", [code]) => SessionCommand::Locale(
                Locale::from_code(code)
                    .ok_or_else(|| ReaderError::invalid_parameter(format!("unknown locale: {}", code)))?,
            ),
            ("help" | "?", []) => SessionCommand::Help,
            ("q" | "quit" | "exit", []) => SessionCommand::Quit,
            _ => {
                return Err(ReaderError::invalid_parameter(format!(
                    "unknown command: {}",
                    line.trim()
                )))
            }
        };
        Ok(command)
    }
}

/// What the session prints after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Output(String),
    Quit,
}

pub struct ReaderSession<S, P> {
    navigator: ChapterNavigator<S>,
    tracker: ProgressTracker<P>,
}

impl<S, P> ReaderSession<S, P>
where
    S: ContentStore,
    P: ProgressStore + 'static,
{
    pub fn new(navigator: ChapterNavigator<S>, tracker: ProgressTracker<P>) -> Self {
        Self { navigator, tracker }
    }

    pub fn navigator(&self) -> &ChapterNavigator<S> {
        &self.navigator
    }

    /// Render the current page with a position header.
    pub fn render(&self) -> String {
        let view = self.navigator.view();
        let position = self.navigator.position();
        let header = format!(
            "== {} {}. {} | page {}/{} | ~{} min ==",
            self.navigator.path(),
            view.chapter.chapter_number,
            view.title(),
            (position.page_index + 1).min(position.total_pages),
            position.total_pages,
            view.read_time(),
        );
        let body = match self.navigator.current_page() {
            Some(Page::Text { content }) => content.clone(),
            Some(Page::Image { url }) => format!("[image] {}", url),
            None => "(this chapter has no content)".to_string(),
        };
        format!("{}\n{}", header, body)
    }

    pub async fn handle(&mut self, command: SessionCommand) -> Result<Reply, ReaderError> {
        let chapter_id = self.navigator.chapter().id;
        let book_id = self.navigator.chapter().book_id;

        let output = match command {
            SessionCommand::Next => {
                let moved = self.navigator.next().await?;
                self.moved(moved, "end of the book")
            }
            SessionCommand::Previous => {
                let moved = self.navigator.previous().await?;
                self.moved(moved, "start of the book")
            }
            SessionCommand::Page(page) => {
                self.navigator.go_to_page(page - 1)?;
                self.render()
            }
            SessionCommand::Goto(slug) => match self.navigator.go_to_chapter(&slug).await {
                Ok(moved) => self.moved(moved, "chapter load was superseded"),
                Err(err) if err.is_not_found() => format!(
                    "chapter '{}' is not available, see {}",
                    slug,
                    routes::redirect_for(&err)
                        .unwrap_or_else(|| routes::book_path(self.navigator.book_slug()))
                ),
                Err(err) => return Err(err),
            },
            SessionCommand::Scroll(metrics) => {
                let (percentage, _) = self.tracker.record_scroll(chapter_id, book_id, metrics);
                format!("read {}%", percentage)
            }
            SessionCommand::Complete => {
                let _ = self.tracker.mark_completed(chapter_id, book_id);
                "marked completed".to_string()
            }
            SessionCommand::Reset => {
                let _ = self.tracker.reset(chapter_id);
                "progress reset".to_string()
            }
            SessionCommand::Progress => match self.tracker.progress(chapter_id).await {
                Some(progress) => format!(
                    "{} ({}%)",
                    progress.status.as_str(),
                    progress.reading_percentage
                ),
                None => "not_started".to_string(),
            },
            SessionCommand::Summary => match self.tracker.book_summary(book_id).await {
                Some(summary) => format!(
                    "{}/{} chapters completed, {} started, {}%",
                    summary.chapters_completed,
                    summary.total_chapters,
                    summary.chapters_read,
                    summary.progress_percentage
                ),
                None => "no progress in this book yet".to_string(),
            },
            SessionCommand::Toc => {
                let locale = self.navigator.locale();
                let current = self.navigator.chapter().id;
                self.navigator
                    .table_of_contents()
                    .await?
                    .iter()
                    .map(|entry| {
                        let title = match (locale, entry.title_hi.as_deref()) {
                            (Locale::Hindi, Some(hi)) if !hi.trim().is_empty() => hi,
                            _ => entry.title.as_str(),
                        };
                        let marker = if entry.id == current { '>' } else { ' ' };
                        format!("{} {:>3}. {} [{}]", marker, entry.chapter_number, title, entry.slug)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            SessionCommand::Locale(locale) => {
                self.navigator.set_locale(locale);
                self.render()
            }
            SessionCommand::Help => HELP.to_string(),
            SessionCommand::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Output(output))
    }

    fn moved(&self, moved: Moved, boundary: &str) -> String {
        match moved {
            Moved::Page | Moved::Chapter => self.render(),
            Moved::Stayed => format!("({})", boundary),
        }
    }

    /// Read commands from `input` until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> Result<(), ReaderError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output.write_all(self.render().as_bytes()).await?;
        output.write_all(b"\n").await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let reply = match line.parse::<SessionCommand>() {
                Ok(command) => self.handle(command).await,
                Err(err) => Err(err),
            };
            let text = match reply {
                Ok(Reply::Quit) => break,
                Ok(Reply::Output(text)) => text,
                Err(err) => {
                    tracing::debug!(error = %err, "command failed");
                    format!("error: {}", err.message)
                }
            };
            output.write_all(text.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok(())
    }
}
