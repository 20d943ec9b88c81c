//! Filter policy deciding which fetched items are worth downloading
//!
//! Rules are evaluated in a fixed order and stop at the first failure, so the
//! logged rejection reason is always the earliest rule that failed. Width and
//! height minimums are reported but never reject an item.

use crate::item::ItemMetadata;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How `tags_include` is matched against an item's tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagsMode {
    /// Every included tag must be present
    #[default]
    All,
    /// At least one included tag must be present
    Any,
}

impl FromStr for TagsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "any" => Ok(Self::Any),
            other => Err(format!("unknown tags_mode '{}', expected all or any", other)),
        }
    }
}

impl<'de> Deserialize<'de> for TagsMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable acceptance thresholds
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    /// Negative values accept every item, including ones with no likes
    pub like_more_than: i64,
    pub bookmark_more_than: i64,
    pub min_width: u32,
    pub min_height: u32,
    pub tags_include: BTreeSet<String>,
    pub tags_exclude: BTreeSet<String>,
    pub tags_mode: TagsMode,
    pub allow_multi_page: bool,
}

/// The first rule an item failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MultiPage { page_count: u32 },
    TooFewLikes { like_count: u64, threshold: i64 },
    TooFewBookmarks { bookmark_count: u64, threshold: i64 },
    ExcludedTag(String),
    MissingTags(Vec<String>),
    NoRequiredTag,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultiPage { page_count } => {
                write!(f, "{} pages but multi-page download is disabled", page_count)
            }
            Self::TooFewLikes {
                like_count,
                threshold,
            } => write!(f, "like_count = {} <= {}", like_count, threshold),
            Self::TooFewBookmarks {
                bookmark_count,
                threshold,
            } => write!(f, "bookmark_count = {} <= {}", bookmark_count, threshold),
            Self::ExcludedTag(tag) => write!(f, "tag \"{}\" is in tags_exclude", tag),
            Self::MissingTags(tags) => write!(f, "required tags {:?} are missing", tags),
            Self::NoRequiredTag => write!(f, "none of the required tags is present"),
        }
    }
}

impl FilterPolicy {
    /// Evaluates the rules in order and returns the first failure
    pub fn evaluate(&self, meta: &ItemMetadata) -> Result<(), Rejection> {
        if meta.is_multi_page() && !self.allow_multi_page {
            return Err(Rejection::MultiPage {
                page_count: meta.page_count,
            });
        }

        if at_most(meta.like_count, self.like_more_than) {
            return Err(Rejection::TooFewLikes {
                like_count: meta.like_count,
                threshold: self.like_more_than,
            });
        }

        if at_most(meta.bookmark_count, self.bookmark_more_than) {
            return Err(Rejection::TooFewBookmarks {
                bookmark_count: meta.bookmark_count,
                threshold: self.bookmark_more_than,
            });
        }

        // Advisory only: undersized items are still accepted.
        if meta.width < self.min_width {
            tracing::info!(id = %meta.id, "width {} < {}", meta.width, self.min_width);
        }
        if meta.height < self.min_height {
            tracing::info!(id = %meta.id, "height {} < {}", meta.height, self.min_height);
        }

        if let Some(tag) = self.tags_exclude.iter().find(|t| meta.tags.contains(*t)) {
            return Err(Rejection::ExcludedTag(tag.clone()));
        }

        match self.tags_mode {
            TagsMode::All => {
                let missing: Vec<String> = self
                    .tags_include
                    .iter()
                    .filter(|t| !meta.tags.contains(*t))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(Rejection::MissingTags(missing));
                }
            }
            TagsMode::Any => {
                if !self.tags_include.is_empty()
                    && !self.tags_include.iter().any(|t| meta.tags.contains(t))
                {
                    return Err(Rejection::NoRequiredTag);
                }
            }
        }

        Ok(())
    }

    /// Returns true if the item passes every rule, logging the outcome
    pub fn accepts(&self, meta: &ItemMetadata) -> bool {
        match self.evaluate(meta) {
            Ok(()) => {
                tracing::info!(id = %meta.id, "requirement satisfied");
                true
            }
            Err(reason) => {
                tracing::info!(id = %meta.id, %reason, "requirement not reached, skipping");
                false
            }
        }
    }
}

/// True when `count <= threshold`, with counts beyond `i64` always above it
fn at_most(count: u64, threshold: i64) -> bool {
    i64::try_from(count).map_or(false, |count| count <= threshold)
}

/// Free-function form of [`FilterPolicy::accepts`]
pub fn accepts(meta: &ItemMetadata, policy: &FilterPolicy) -> bool {
    policy.accepts(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::sample_metadata;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn item_with_tags(list: &[&str]) -> ItemMetadata {
        let mut meta = sample_metadata("1");
        meta.tags = tags(list);
        meta
    }

    #[test]
    fn test_tags_mode_parse() {
        assert_eq!("ALL".parse::<TagsMode>().unwrap(), TagsMode::All);
        assert_eq!(" any ".parse::<TagsMode>().unwrap(), TagsMode::Any);
        assert!("some".parse::<TagsMode>().is_err());
    }

    #[test]
    fn test_multi_page_rejected_first() {
        let policy = FilterPolicy {
            like_more_than: 1_000_000,
            ..FilterPolicy::default()
        };
        let mut meta = sample_metadata("1");
        meta.page_count = 4;

        assert_eq!(
            policy.evaluate(&meta),
            Err(Rejection::MultiPage { page_count: 4 })
        );
    }

    #[test]
    fn test_like_threshold_is_exclusive() {
        let policy = FilterPolicy {
            like_more_than: 100,
            ..FilterPolicy::default()
        };
        let mut meta = sample_metadata("1");
        meta.like_count = 100;
        assert!(!policy.accepts(&meta));

        meta.like_count = 101;
        assert!(policy.accepts(&meta));
    }

    #[test]
    fn test_negative_threshold_accepts_zero_counts() {
        let policy = FilterPolicy {
            like_more_than: -1,
            bookmark_more_than: -1,
            ..FilterPolicy::default()
        };
        let mut meta = sample_metadata("1");
        meta.like_count = 0;
        meta.bookmark_count = 0;
        assert_eq!(policy.evaluate(&meta), Ok(()));

        // A zero threshold still turns them down.
        let policy = FilterPolicy::default();
        assert!(matches!(
            policy.evaluate(&meta),
            Err(Rejection::TooFewLikes { like_count: 0, threshold: 0 })
        ));
    }

    #[test]
    fn test_bookmark_threshold() {
        let policy = FilterPolicy {
            bookmark_more_than: 500,
            ..FilterPolicy::default()
        };
        let meta = sample_metadata("1");
        assert!(matches!(
            policy.evaluate(&meta),
            Err(Rejection::TooFewBookmarks { .. })
        ));
    }

    #[test]
    fn test_dimensions_never_reject() {
        let policy = FilterPolicy {
            min_width: 10_000,
            min_height: 10_000,
            ..FilterPolicy::default()
        };
        assert!(policy.accepts(&sample_metadata("1")));
    }

    #[test]
    fn test_all_mode() {
        let policy = FilterPolicy {
            tags_include: tags(&["a", "b"]),
            tags_mode: TagsMode::All,
            ..FilterPolicy::default()
        };

        assert_eq!(
            policy.evaluate(&item_with_tags(&["a"])),
            Err(Rejection::MissingTags(vec!["b".to_string()]))
        );
        assert!(policy.accepts(&item_with_tags(&["a", "b", "c"])));
    }

    #[test]
    fn test_any_mode() {
        let policy = FilterPolicy {
            tags_include: tags(&["a", "b"]),
            tags_mode: TagsMode::Any,
            ..FilterPolicy::default()
        };

        assert!(policy.accepts(&item_with_tags(&["b"])));
        assert_eq!(
            policy.evaluate(&item_with_tags(&["c"])),
            Err(Rejection::NoRequiredTag)
        );
    }

    #[test]
    fn test_any_mode_with_no_required_tags_passes() {
        let policy = FilterPolicy {
            tags_mode: TagsMode::Any,
            ..FilterPolicy::default()
        };
        assert!(policy.accepts(&item_with_tags(&[])));
        assert!(policy.accepts(&item_with_tags(&["x"])));
    }

    #[test]
    fn test_exclude_wins() {
        let policy = FilterPolicy {
            tags_include: tags(&["a"]),
            tags_exclude: tags(&["x"]),
            tags_mode: TagsMode::Any,
            ..FilterPolicy::default()
        };
        assert_eq!(
            policy.evaluate(&item_with_tags(&["a", "x"])),
            Err(Rejection::ExcludedTag("x".to_string()))
        );
        assert!(!accepts(&item_with_tags(&["a", "x"]), &policy));
    }
}
