//! Crawler module: the frontier engine and its collaborators
//!
//! This module contains the core crawling logic, including:
//! - The bounded frontier and visited set
//! - Item metadata fetching and parsing
//! - Page downloads into like-count buckets
//! - Related-item discovery
//! - The fetch -> filter -> download -> discover loop

mod bucketing;
mod discovery;
mod downloader;
mod engine;
mod fetcher;
mod frontier;

pub use bucketing::FolderBucketing;
pub use discovery::PixivDiscovery;
pub use downloader::{DownloadReport, PixivDownloader};
pub use engine::{CrawlEngine, CrawlSummary, Outcome};
pub use fetcher::{parse_item_page, PixivFetcher};
pub use frontier::{CrawlFrontier, ExtractionOrder, FrontierSettings};

use crate::config::Config;
use crate::item::{ItemId, ItemMetadata};
use crate::session::SessionManager;
use crate::storage::scan_downloaded_ids;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Retrieves and parses one item's metadata
///
/// Implementations return either fully-populated metadata or an error, never
/// a partial result.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    async fn fetch(&self, id: &ItemId) -> Result<ItemMetadata>;
}

/// Persists the binary assets of one item
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    async fn download_all(
        &self,
        meta: &ItemMetadata,
        base_dir: &Path,
        bucketing: &FolderBucketing,
    ) -> Result<DownloadReport>;
}

/// Lists items related to a given one
///
/// Failures are logged by the implementation and reported as an empty list,
/// so discovery can never halt a crawl.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn related(&self, id: &ItemId) -> Vec<ItemId>;
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Create the download directory and rebuild the visited set from it
/// 2. Restore or establish the authenticated session
/// 3. Expand the frontier from `start` until the download limit is passed
///    or nothing is left to crawl
///
/// # Arguments
///
/// * `config` - The loaded and validated configuration
/// * `start` - Id to crawl from; `None` only establishes the session
///
/// # Returns
///
/// * `Ok(Some(CrawlSummary))` - The crawl ran to completion
/// * `Ok(None)` - No start id was given
/// * `Err(CrawlError)` - Login failed, a fatal error stopped the crawl, or the
///   download directory could not be prepared
pub async fn crawl(config: Config, start: Option<ItemId>) -> Result<Option<CrawlSummary>> {
    let download_dir = config.system.download_dir_path.clone();
    std::fs::create_dir_all(&download_dir)?;

    let session = Arc::new(SessionManager::new(&config)?);
    session.restore_or_login().await?;

    let Some(start) = start else {
        tracing::info!("No start id given and auto_start is off, nothing to crawl");
        return Ok(None);
    };

    let visited = scan_downloaded_ids(&download_dir)?;
    tracing::info!(
        "{} items already downloaded under {}",
        visited.len(),
        download_dir.display()
    );

    let mut engine = CrawlEngine::new(
        CrawlFrontier::new(visited, config.frontier_settings()),
        PixivFetcher::new(Arc::clone(&session))?,
        PixivDownloader::new(Arc::clone(&session)),
        PixivDiscovery::new(session),
    )
    .with_filter(config.filter_policy())
    .with_bucketing(config.bucketing())
    .with_download_dir(download_dir)
    .with_download_limit(config.system.download_limit);

    let summary = engine.run(start).await?;
    Ok(Some(summary))
}
