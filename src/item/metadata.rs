use crate::item::ItemId;
use std::collections::BTreeSet;
use std::ops::Range;

/// Placeholder substituted with the page index in URL and filename templates
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Parsed metadata for one item
///
/// A value of this type is always fully populated: the fetcher either
/// extracts every field or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    pub id: ItemId,
    pub title: String,

    /// Asset URL with a `{page}` placeholder
    pub download_url: String,

    /// Asset filename with a `{page}` placeholder
    pub filename_template: String,

    pub width: u32,
    pub height: u32,

    /// Number of pages, at least 1
    pub page_count: u32,

    pub bookmark_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub tags: BTreeSet<String>,
}

impl ItemMetadata {
    /// Page indices to download
    pub fn pages(&self) -> Range<u32> {
        0..self.page_count
    }

    pub fn download_url_for(&self, page: u32) -> String {
        self.download_url
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    pub fn filename_for(&self, page: u32) -> String {
        self.filename_template
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    pub fn is_multi_page(&self) -> bool {
        self.page_count > 1
    }
}
