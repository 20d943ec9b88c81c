//! Item fetcher implementation
//!
//! This module turns an item id into [`ItemMetadata`]:
//! - Navigating to the item's detail page through the session
//! - Mapping 401/403 to an authentication failure
//! - Extracting every metadata field from the page, or failing as a whole
//!
//! The detail page embeds its data as loosely structured JSON fragments, so
//! extraction is pattern based and isolated in [`ItemPageParser`].

use crate::crawler::ItemFetcher;
use crate::item::{ItemId, ItemMetadata, PAGE_PLACEHOLDER};
use crate::session::SessionManager;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use std::sync::Arc;

/// Compiled extraction patterns for the item detail page
#[derive(Debug, Clone)]
pub struct ItemPageParser {
    original: Regex,
    filename: Regex,
    title: Regex,
    id: Regex,
    stats: Regex,
    tag: Regex,
}

impl ItemPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            original: Regex::new(r#""original":"(.*?)""#)?,
            filename: Regex::new(r"/([\w_]+\.\w{3})$")?,
            title: Regex::new(r#""illustTitle":"(.*?)""#)?,
            id: Regex::new(r#""illustId":"(.*?)""#)?,
            stats: Regex::new(
                r#""width":(\d+),"height":(\d+),"pageCount":(\d+),"bookmarkCount":(\d+),"likeCount":(\d+),"commentCount":(\d+)"#,
            )?,
            tag: Regex::new(r#""tag":"(\S*?)""#)?,
        })
    }

    /// Parses one detail page, failing if any required field is missing
    pub fn parse(&self, html: &str) -> Result<ItemMetadata> {
        let download_url = capture(&self.original, html, "original")?.replace('\\', "");
        let filename = self
            .filename
            .captures(&download_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                CrawlError::parse(
                    "item page",
                    format!("no filename in download url '{}'", download_url),
                )
            })?;

        let title = unescape(capture(&self.title, html, "illustTitle")?);
        let id = ItemId::new(capture(&self.id, html, "illustId")?);

        let stats = self
            .stats
            .captures(html)
            .ok_or_else(|| CrawlError::parse("item page", "missing size and counter fields"))?;
        let number = |index: usize, name: &str| -> Result<u64> {
            stats[index]
                .parse::<u64>()
                .map_err(|e| CrawlError::parse("item page", format!("bad {}: {}", name, e)))
        };

        let page_count = number(3, "pageCount")?;
        if page_count == 0 {
            return Err(CrawlError::parse("item page", "pageCount is 0"));
        }

        let tags = self
            .tag
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| unescape(m.as_str()))
            .collect();

        Ok(ItemMetadata {
            id,
            title,
            download_url: page_template(&download_url),
            filename_template: page_template(&filename),
            width: narrow(number(1, "width")?, "width")?,
            height: narrow(number(2, "height")?, "height")?,
            page_count: narrow(page_count, "pageCount")?,
            bookmark_count: number(4, "bookmarkCount")?,
            like_count: number(5, "likeCount")?,
            comment_count: number(6, "commentCount")?,
            tags,
        })
    }
}

fn capture<'h>(pattern: &Regex, html: &'h str, field: &str) -> Result<&'h str> {
    pattern
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| CrawlError::parse("item page", format!("missing \"{}\"", field)))
}

fn narrow(value: u64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| CrawlError::parse("item page", format!("{} out of range: {}", field, value)))
}

/// Decodes JSON string escapes such as `\u6771`, keeping the raw text on failure
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// Replaces the first-page suffix `_p0` with the page placeholder
fn page_template(value: &str) -> String {
    match value.rfind("_p0") {
        Some(pos) => format!(
            "{}_p{}{}",
            &value[..pos],
            PAGE_PLACEHOLDER,
            &value[pos + "_p0".len()..]
        ),
        None => value.to_string(),
    }
}

/// Parses an item detail page with freshly compiled patterns
pub fn parse_item_page(html: &str) -> Result<ItemMetadata> {
    ItemPageParser::new()?.parse(html)
}

/// Fetches item pages through the shared session
pub struct PixivFetcher {
    session: Arc<SessionManager>,
    parser: ItemPageParser,
}

impl PixivFetcher {
    /// Creates a fetcher sharing `session`, compiling the page patterns once
    pub fn new(session: Arc<SessionManager>) -> Result<Self> {
        Ok(Self {
            session,
            parser: ItemPageParser::new()?,
        })
    }
}

#[async_trait]
impl ItemFetcher for PixivFetcher {
    async fn fetch(&self, id: &ItemId) -> Result<ItemMetadata> {
        let url = self.session.endpoints().item_url(id);
        let page = self.session.navigate(&url).await?;

        match page.status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(CrawlError::Auth(format!(
                    "item page {} answered {}",
                    url, page.status
                )));
            }
            status => {
                return Err(CrawlError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
        }

        let meta = self.parser.parse(&page.text())?;
        tracing::debug!(
            id = %meta.id,
            pages = meta.page_count,
            likes = meta.like_count,
            "Parsed item \"{}\"",
            meta.title
        );
        Ok(meta)
    }
}
