//! Item module: identifiers and parsed item metadata
//!
//! - `ItemId`: the opaque key naming one crawlable illustration
//! - `ItemMetadata`: the fully-populated result of fetching one item

mod id;
mod metadata;

pub use id::ItemId;
pub use metadata::{ItemMetadata, PAGE_PLACEHOLDER};

#[cfg(test)]
pub(crate) use metadata::tests::sample_metadata;
