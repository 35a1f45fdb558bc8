//! Chapter pagination
//! Splits chapter markup into fixed-size character windows and appends the image page.

use crate::error::ReaderError;
use serde::{Deserialize, Serialize};

/// Characters per page used by the web reader.
pub const DEFAULT_PAGE_SIZE: usize = 2400;

/// A renderable page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Page {
    /// Raw HTML slice, injected verbatim by the view layer
    Text { content: String },
    /// Trailing chapter illustration
    Image { url: String },
}

impl Page {
    pub fn is_image(&self) -> bool {
        matches!(self, Page::Image { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Page::Text { content } => Some(content),
            Page::Image { .. } => None,
        }
    }
}

/// Where a page window is allowed to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Cut at exactly `page_size` characters, even inside a tag.
    #[default]
    Blind,
    /// Extend a window that would end inside `<...>` through the closing `>`.
    TagSafe,
}

impl SplitPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "blind" => Some(SplitPolicy::Blind),
            "tag_safe" | "tag-safe" | "tagsafe" => Some(SplitPolicy::TagSafe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    policy: SplitPolicy,
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            policy: SplitPolicy::Blind,
        }
    }
}

impl Paginator {
    pub fn new(page_size: usize) -> Result<Self, ReaderError> {
        if page_size == 0 {
            return Err(ReaderError::invalid_parameter("page size must be greater than 0"));
        }
        Ok(Self {
            page_size,
            policy: SplitPolicy::Blind,
        })
    }

    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    /// Split `content` into text pages, then append one image page if `image` is set.
    ///
    /// Empty content yields no text pages, so a chapter may consist of the image page alone.
    pub fn paginate(&self, content: &str, image: Option<&str>) -> Vec<Page> {
        let mut pages: Vec<Page> = self
            .windows(content)
            .map(|content| Page::Text {
                content: content.to_string(),
            })
            .collect();

        if let Some(url) = image {
            pages.push(Page::Image {
                url: url.to_string(),
            });
        }
        pages
    }

    /// Non-overlapping windows covering `content` in order.
    pub fn windows<'a>(&self, content: &'a str) -> Windows<'a> {
        Windows {
            content,
            start: 0,
            page_size: self.page_size,
            policy: self.policy,
        }
    }
}

/// Iterator over the text windows of one chapter.
pub struct Windows<'a> {
    content: &'a str,
    start: usize,
    page_size: usize,
    policy: SplitPolicy,
}

impl<'a> Iterator for Windows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.content.len() {
            return None;
        }

        let rest = &self.content[self.start..];
        let mut end = rest
            .char_indices()
            .nth(self.page_size)
            .map_or(self.content.len(), |(offset, _)| self.start + offset);

        if self.policy == SplitPolicy::TagSafe {
            end = tag_safe_end(self.content, self.start, end);
        }

        let window = &self.content[self.start..end];
        self.start = end;
        Some(window)
    }
}

fn tag_safe_end(content: &str, start: usize, end: usize) -> usize {
    let window = &content[start..end];
    match (window.rfind('<'), window.rfind('>')) {
        (Some(open), close) if close.map_or(true, |close| close < open) => content[end..]
            .find('>')
            .map_or(content.len(), |offset| end + offset + 1),
        _ => end,
    }
}
