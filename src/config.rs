//! Reader configuration
//! Defaults, then an optional JSON file (`SANTVAANI_CONFIG`), then environment variables.

use crate::error::ReaderError;
use crate::models::Locale;
use crate::reader::paginator::{SplitPolicy, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE_ENV: &str = "SANTVAANI_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub database_url: String,
    /// Characters per text page
    pub page_size: usize,
    pub split_policy: SplitPolicy,
    pub locale: Locale,
    /// Scroll percentage at which a chapter is marked completed
    pub completion_threshold: u8,
    pub chapter_cache_ttl_secs: u64,
    pub chapter_cache_capacity: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://santvaani.db?mode=rwc".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            split_policy: SplitPolicy::Blind,
            locale: Locale::English,
            completion_threshold: 100,
            chapter_cache_ttl_secs: 300,
            chapter_cache_capacity: 256,
        }
    }
}

impl ReaderConfig {
    /// Load `.env`, the optional JSON file and environment overrides.
    pub fn load() -> Result<Self, ReaderError> {
        dotenvy::dotenv().ok();

        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };

        let config = base.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ReaderError::config(format!(
                "cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: ReaderConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply `SANTVAANI_*` overrides looked up through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ReaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SANTVAANI_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(raw) = lookup("SANTVAANI_PAGE_SIZE") {
            self.page_size = parse_value("SANTVAANI_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("SANTVAANI_SPLIT_POLICY") {
            self.split_policy = SplitPolicy::from_name(&raw).ok_or_else(|| {
                ReaderError::config(format!("SANTVAANI_SPLIT_POLICY: unknown policy '{}'", raw))
            })?;
        }
        if let Some(raw) = lookup("SANTVAANI_LOCALE") {
            self.locale = Locale::from_code(&raw).ok_or_else(|| {
                ReaderError::config(format!("SANTVAANI_LOCALE: unknown locale '{}'", raw))
            })?;
        }
        if let Some(raw) = lookup("SANTVAANI_COMPLETION_THRESHOLD") {
            self.completion_threshold = parse_value("SANTVAANI_COMPLETION_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("SANTVAANI_CHAPTER_CACHE_TTL_SECS") {
            self.chapter_cache_ttl_secs = parse_value("SANTVAANI_CHAPTER_CACHE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("SANTVAANI_CHAPTER_CACHE_CAPACITY") {
            self.chapter_cache_capacity = parse_value("SANTVAANI_CHAPTER_CACHE_CAPACITY", &raw)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.page_size == 0 {
            return Err(ReaderError::config("page_size must be greater than 0"));
        }
        if self.completion_threshold > 100 {
            return Err(ReaderError::config(format!(
                "completion_threshold must be within 0..=100, got {}",
                self.completion_threshold
            )));
        }
        Ok(())
    }

    pub fn chapter_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.chapter_cache_ttl_secs)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ReaderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ReaderError::config(format!("{}: invalid value '{}': {}", key, raw, e)))
}
