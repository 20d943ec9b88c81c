//! Storage module: the on-disk library of downloaded pages
//!
//! There is no database. The download directory itself is the record of what
//! has been crawled: every page file is named `<id>_p<page>.<ext>`, so the
//! visited set of a new run is rebuilt by walking that tree.

use crate::item::ItemId;
use crate::Result;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// Page suffix removed from a filename to recover its item id
const PAGE_SUFFIX: &str = r"_p\d+.*$";

/// Walks `dir` recursively and collects the ids of every downloaded file
///
/// Multiple pages of one item collapse into a single id. A missing directory
/// yields an empty set.
///
/// # Arguments
///
/// * `dir` - Root of the download library, bucket folders included
///
/// # Returns
///
/// * `Ok(HashSet<ItemId>)` - Every id with at least one file on disk
/// * `Err(CrawlError::Io)` - A directory could not be read
pub fn scan_downloaded_ids(dir: &Path) -> Result<HashSet<ItemId>> {
    let suffix = Regex::new(PAGE_SUFFIX)?;
    let mut ids = HashSet::new();

    if !dir.exists() {
        tracing::debug!("Download directory {} does not exist yet", dir.display());
        return Ok(ids);
    }

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type()?.is_dir() {
                stack.push(path);
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!("Skipping non UTF-8 filename {}", path.display());
                continue;
            };

            let id = suffix.replace(name, "");
            if !id.is_empty() {
                ids.insert(ItemId::new(id.into_owned()));
            }
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let ids = scan_downloaded_ids(&temp.path().join("nope")).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_pages_collapse_to_one_id() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("70000000_p0.png"));
        touch(&temp.path().join("70000000_p1.png"));
        touch(&temp.path().join("70000001_p0.jpg"));

        let ids = scan_downloaded_ids(temp.path()).unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&ItemId::from(70000000)));
        assert!(ids.contains(&ItemId::from(70000001)));
    }

    #[test]
    fn test_scan_descends_into_buckets() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("100-500").join("5_p0.png"));
        touch(&temp.path().join("500+").join("6_p3.jpg"));
        touch(&temp.path().join("7_p0.gif"));

        let ids = scan_downloaded_ids(temp.path()).unwrap();

        let expected: HashSet<ItemId> = [5u64, 6, 7].into_iter().map(ItemId::from).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_scan_is_stable_across_runs() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("9_p0.png"));

        let first = scan_downloaded_ids(temp.path()).unwrap();
        let second = scan_downloaded_ids(temp.path()).unwrap();
        assert_eq!(first, second);
    }
}
