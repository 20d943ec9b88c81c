//! Frontier engine - main crawl orchestration logic
//!
//! The engine processes exactly one id at a time: fetch, filter, download
//! every page, then discover related ids. Each iteration produces a
//! `Result<Outcome, CrawlError>`; only fatal errors end the run, anything else
//! abandons that one id and moves on.

use crate::crawler::{
    AssetDownloader, CrawlFrontier, DiscoverySource, DownloadReport, FolderBucketing, ItemFetcher,
};
use crate::filter::FilterPolicy;
use crate::item::ItemId;
use crate::{CrawlError, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Successful result of processing one id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The item passed the filter and its pages were downloaded
    Downloaded(DownloadReport),
    /// The filter turned the item down
    Rejected,
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Items downloaded
    pub processed: u32,
    pub rejected: u32,
    pub failed: u32,
    /// Size of the visited set when the run ended
    pub visited: usize,
    pub elapsed: Duration,
}

/// Crawl engine driving the fetch -> filter -> download -> discover loop
pub struct CrawlEngine<F, D, S> {
    frontier: CrawlFrontier,
    fetcher: F,
    downloader: D,
    discovery: S,
    filter: Option<FilterPolicy>,
    bucketing: FolderBucketing,
    download_dir: PathBuf,
    download_limit: u32,
}

impl<F, D, S> CrawlEngine<F, D, S>
where
    F: ItemFetcher,
    D: AssetDownloader,
    S: DiscoverySource,
{
    /// Creates an engine with no filter, no bucketing and no download limit
    ///
    /// # Arguments
    ///
    /// * `frontier` - Frontier already holding the previously downloaded ids
    /// * `fetcher` - Turns an id into item metadata
    /// * `downloader` - Writes the pages of accepted items to disk
    /// * `discovery` - Lists related ids after each download
    ///
    /// Use the `with_*` builders to attach the filter, bucketing, download
    /// directory and download limit.
    pub fn new(frontier: CrawlFrontier, fetcher: F, downloader: D, discovery: S) -> Self {
        Self {
            frontier,
            fetcher,
            downloader,
            discovery,
            filter: None,
            bucketing: FolderBucketing::default(),
            download_dir: PathBuf::from("."),
            download_limit: u32::MAX,
        }
    }

    pub fn with_filter(mut self, filter: Option<FilterPolicy>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_bucketing(mut self, bucketing: FolderBucketing) -> Self {
        self.bucketing = bucketing;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// The run stops once more than `limit` items have been downloaded
    pub fn with_download_limit(mut self, limit: u32) -> Self {
        self.download_limit = limit;
        self
    }

    pub fn frontier(&self) -> &CrawlFrontier {
        &self.frontier
    }

    /// Fetches, filters and downloads one item
    async fn process(&self, id: &ItemId) -> Result<Outcome> {
        let meta = self.fetcher.fetch(id).await?;

        if let Some(policy) = &self.filter {
            if !policy.accepts(&meta) {
                return Ok(Outcome::Rejected);
            }
        }

        let report = self
            .downloader
            .download_all(&meta, &self.download_dir, &self.bucketing)
            .await?;
        Ok(Outcome::Downloaded(report))
    }

    /// Runs the main crawl loop
    ///
    /// Starting from `seed`, each iteration:
    /// 1. Dequeues one id (marking it visited)
    /// 2. Fetches its metadata
    /// 3. Applies the filter, if any
    /// 4. Downloads every page
    /// 5. Queues the related ids of downloaded items
    ///
    /// The loop ends when the frontier is empty or more than the download
    /// limit has been downloaded. The seed is queued even if it was
    /// downloaded before.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - The run ended normally
    /// * `Err(CrawlError::Auth)` - The session stopped being authorized
    pub async fn run(&mut self, seed: ItemId) -> Result<CrawlSummary> {
        let started = Instant::now();
        let (mut processed, mut rejected, mut failed) = (0u32, 0u32, 0u32);

        self.frontier.seed(seed);

        while !self.frontier.is_empty() && processed <= self.download_limit {
            let Some(id) = self.frontier.dequeue() else {
                break;
            };
            tracing::info!(id = %id, "Crawling item #{}", processed + 1);

            match self.process(&id).await {
                Ok(Outcome::Downloaded(report)) => {
                    processed += 1;
                    tracing::info!(
                        id = %id,
                        "Saved {} pages ({} skipped) to {}",
                        report.saved.len(),
                        report.skipped.len(),
                        report.dir.display()
                    );

                    let related = self.discovery.related(&id).await;
                    let added = self.frontier.enqueue_many(related);
                    tracing::info!(
                        id = %id,
                        "{} new ids queued, {} pending",
                        added,
                        self.frontier.pending_len()
                    );
                }
                Ok(Outcome::Rejected) => {
                    rejected += 1;
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(id = %id, "Stopping crawl: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    failed += 1;
                    log_failure(&id, &e);
                }
            }
        }

        let summary = CrawlSummary {
            processed,
            rejected,
            failed,
            visited: self.frontier.visited_len(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Crawling finished, total crawled {} items ({} rejected, {} failed) in {:?}",
            summary.processed,
            summary.rejected,
            summary.failed,
            summary.elapsed
        );
        Ok(summary)
    }
}

fn log_failure(id: &ItemId, error: &CrawlError) {
    match error {
        CrawlError::Parse { .. } => {
            tracing::warn!(id = %id, "Item page could not be parsed, skipping: {}", error)
        }
        _ => tracing::warn!(id = %id, "Item failed, skipping: {}", error),
    }
}
