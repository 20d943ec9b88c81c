//! Asset downloader implementation
//!
//! Every page of an item is fetched with the session's current `Referer` and
//! written to `<base_dir>/<bucket>/<filename>`. A page answering anything but
//! 200 is logged and skipped; the remaining pages are still attempted. The
//! bucket directory is only created once a page actually arrives.

use crate::crawler::{AssetDownloader, FolderBucketing};
use crate::item::ItemMetadata;
use crate::session::SessionManager;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// What happened to the pages of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// Directory the pages were written to
    pub dir: PathBuf,
    pub saved: Vec<PathBuf>,
    /// Page indices that did not answer 200
    pub skipped: Vec<u32>,
    pub bytes: u64,
}

/// Resolves the destination directory for an item
pub fn destination_dir(base_dir: &Path, bucketing: &FolderBucketing, like_count: u64) -> PathBuf {
    match bucketing.folder_for(like_count) {
        Some(bucket) => base_dir.join(bucket),
        None => base_dir.to_path_buf(),
    }
}

/// Downloads item pages through the shared session
pub struct PixivDownloader {
    session: Arc<SessionManager>,
}

impl PixivDownloader {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl AssetDownloader for PixivDownloader {
    async fn download_all(
        &self,
        meta: &ItemMetadata,
        base_dir: &Path,
        bucketing: &FolderBucketing,
    ) -> Result<DownloadReport> {
        let dir = destination_dir(base_dir, bucketing, meta.like_count);

        let mut report = DownloadReport {
            dir: dir.clone(),
            saved: Vec::new(),
            skipped: Vec::new(),
            bytes: 0,
        };

        for page_index in meta.pages() {
            let url = meta.download_url_for(page_index);
            let started = Instant::now();
            let page = self.session.get(&url).await?;

            if !page.is_ok() {
                tracing::error!(
                    id = %meta.id,
                    url = %url,
                    status = %page.status,
                    "Downloading page {} failed, skipping it",
                    page_index
                );
                report.skipped.push(page_index);
                continue;
            }

            if report.saved.is_empty() {
                tokio::fs::create_dir_all(&dir).await?;
            }
            let path = dir.join(meta.filename_for(page_index));
            tokio::fs::write(&path, &page.body).await?;

            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            let size = page.body.len() as u64;
            tracing::info!(
                "Downloaded {} at {:.2}KB/s in {:.2}s",
                path.display(),
                size as f64 / 1000.0 / elapsed,
                elapsed
            );

            report.bytes += size;
            report.saved.push(path);
        }

        Ok(report)
    }
}
