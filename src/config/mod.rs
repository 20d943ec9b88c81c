//! Configuration module for Pixiv-Frontier
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file that supplies credentials, paths, filter thresholds and crawl budget.
//!
//! # Example
//!
//! ```no_run
//! use pixiv_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Download limit: {}", config.system.download_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AccountConfig, Config, FilterConfig, NetworkConfig, SystemConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
