use crate::crawler::{ExtractionOrder, FolderBucketing, FrontierSettings};
use crate::filter::{FilterPolicy, TagsMode};
use crate::item::ItemId;
use crate::session::{Endpoints, RetryPolicy};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Pixiv-Frontier
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pixiv: AccountConfig,
    pub system: SystemConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Platform account credentials
#[derive(Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Paths, crawl budget and frontier behavior
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Root directory for downloaded pages
    pub download_dir_path: PathBuf,

    /// Where the session cookie store is kept between runs
    pub cookies_path: PathBuf,

    /// The crawl stops once more than this many items were downloaded
    pub download_limit: u32,

    #[serde(default)]
    pub separate_folder_by_like_count: bool,

    /// Ascending like-count thresholds, written as "100,500,1000"
    #[serde(default, deserialize_with = "csv::integers")]
    pub separate_level: Vec<u64>,

    #[serde(default)]
    pub auto_start: bool,

    /// Written either as a string or as a bare number
    #[serde(default)]
    pub start_illust_id: Option<ItemId>,

    /// Maximum number of pending ids
    #[serde(default = "default_frontier_capacity")]
    pub frontier_capacity: usize,

    /// Maximum number of ids accepted from one discovery batch
    #[serde(default = "default_enqueue_batch_limit")]
    pub enqueue_batch_limit: usize,

    #[serde(default)]
    pub frontier_order: ExtractionOrder,
}

/// Item acceptance rules
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub use_filter: bool,

    #[serde(default)]
    pub like_more_than: i64,

    #[serde(default)]
    pub bookmark_more_than: i64,

    #[serde(default, deserialize_with = "csv::strings")]
    pub tags_include: BTreeSet<String>,

    #[serde(default)]
    pub tags_mode: TagsMode,

    #[serde(default, deserialize_with = "csv::strings")]
    pub tags_exclude: BTreeSet<String>,

    #[serde(default)]
    pub min_width: u32,

    #[serde(default)]
    pub min_height: u32,

    #[serde(default)]
    pub enable_multiple_picture_download: bool,
}

/// Transport settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/68.0.3440.106 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

fn default_frontier_capacity() -> usize {
    1000
}

fn default_enqueue_batch_limit() -> usize {
    10
}

impl Config {
    /// Returns the acceptance policy, or `None` when filtering is disabled
    pub fn filter_policy(&self) -> Option<FilterPolicy> {
        if !self.filter.use_filter {
            return None;
        }

        Some(FilterPolicy {
            like_more_than: self.filter.like_more_than,
            bookmark_more_than: self.filter.bookmark_more_than,
            min_width: self.filter.min_width,
            min_height: self.filter.min_height,
            tags_include: self.filter.tags_include.clone(),
            tags_exclude: self.filter.tags_exclude.clone(),
            tags_mode: self.filter.tags_mode,
            allow_multi_page: self.filter.enable_multiple_picture_download,
        })
    }

    /// Returns the folder bucketing thresholds (empty when disabled)
    pub fn bucketing(&self) -> FolderBucketing {
        if self.system.separate_folder_by_like_count {
            FolderBucketing::new(self.system.separate_level.clone())
        } else {
            FolderBucketing::default()
        }
    }

    pub fn frontier_settings(&self) -> FrontierSettings {
        FrontierSettings {
            capacity: self.system.frontier_capacity,
            batch_limit: self.system.enqueue_batch_limit,
            order: self.system.frontier_order,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.network.max_retries,
            base_delay: Duration::from_millis(self.network.retry_backoff_ms),
        }
    }
}

/// Comma-separated list fields
mod csv {
    use super::*;

    fn split(raw: &str) -> impl Iterator<Item = &str> {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn strings<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(split(&raw).map(str::to_string).collect())
    }

    pub fn integers<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        split(&raw)
            .map(|s| {
                s.parse::<u64>().map_err(|e| {
                    serde::de::Error::custom(format!("invalid integer '{}' in list: {}", s, e))
                })
            })
            .collect()
    }
}
