//! Related-item discovery through the platform's recommendation feed

use crate::crawler::DiscoverySource;
use crate::item::ItemId;
use crate::session::SessionManager;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RecommendReply {
    error: bool,
    #[serde(default)]
    message: String,
    /// An object on success, often `[]` on error
    #[serde(default)]
    body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RecommendBody {
    #[serde(default)]
    illusts: Vec<RecommendedIllust>,
    #[serde(default, rename = "nextIds")]
    next_ids: Vec<ItemId>,
}

#[derive(Debug, Deserialize)]
struct RecommendedIllust {
    #[serde(rename = "workId")]
    work_id: ItemId,
}

/// Parses a recommendation reply into an ordered id list
///
/// The first recommended work comes first, followed by the ids the feed
/// would page in next.
pub fn parse_recommendations(body: &[u8]) -> Result<Vec<ItemId>> {
    let reply: RecommendReply = serde_json::from_slice(body)?;
    if reply.error {
        return Err(CrawlError::parse("recommendations", reply.message));
    }

    let body: RecommendBody = serde_json::from_value(reply.body)?;
    Ok(body
        .illusts
        .into_iter()
        .take(1)
        .map(|illust| illust.work_id)
        .chain(body.next_ids)
        .collect())
}

/// Queries the recommendation feed through the shared session
pub struct PixivDiscovery {
    session: Arc<SessionManager>,
}

impl PixivDiscovery {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    async fn try_related(&self, id: &ItemId) -> Result<Vec<ItemId>> {
        let url = self.session.endpoints().related_url(id);
        let page = self.session.get(&url).await?;
        if !page.is_ok() {
            return Err(CrawlError::Status {
                url,
                status: page.status.as_u16(),
            });
        }
        parse_recommendations(&page.body)
    }
}

#[async_trait]
impl DiscoverySource for PixivDiscovery {
    async fn related(&self, id: &ItemId) -> Vec<ItemId> {
        match self.try_related(id).await {
            Ok(ids) => {
                tracing::info!(id = %id, "Got {} recommendations", ids.len());
                ids
            }
            Err(e) => {
                tracing::error!(id = %id, "Getting recommendations failed: {}", e);
                Vec::new()
            }
        }
    }
}
