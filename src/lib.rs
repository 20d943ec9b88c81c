//! Pixiv-Frontier: an authenticated frontier-expansion crawler
//!
//! Starting from a single illustration id, this crate logs into the content
//! platform, fetches item metadata, filters it, downloads the pages and then
//! expands the crawl through the platform's "related items" feed until the
//! download limit is reached or the frontier runs dry.

pub mod config;
pub mod crawler;
pub mod filter;
pub mod item;
pub mod session;
pub mod storage;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Creates a parse failure for the given context
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns true if no further request can succeed after this error
    ///
    /// Only authentication failures are fatal. Everything else is confined to
    /// the item that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true if the same request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlEngine, CrawlFrontier, CrawlSummary};
pub use filter::{FilterPolicy, TagsMode};
pub use item::{ItemId, ItemMetadata};
pub use session::{SessionManager, SessionPhase};
