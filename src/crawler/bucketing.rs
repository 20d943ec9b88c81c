//! Folder bucketing by like count
//!
//! Maps an item's like count onto a sub-directory label using ascending
//! thresholds, e.g. with `[100, 500]`: `100-`, `100-500` and `500+`.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderBucketing {
    levels: Vec<u64>,
}

impl FolderBucketing {
    /// `levels` are expected to be strictly increasing
    pub fn new(levels: Vec<u64>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[u64] {
        &self.levels
    }

    /// Returns the bucket label for `like_count`, or `None` without thresholds
    pub fn folder_for(&self, like_count: u64) -> Option<String> {
        let (first, last) = (*self.levels.first()?, *self.levels.last()?);

        if like_count < first {
            return Some(format!("{}-", first));
        }

        self.levels
            .windows(2)
            .find(|pair| like_count < pair[1])
            .map(|pair| format!("{}-{}", pair[0], pair[1]))
            .or_else(|| Some(format!("{}+", last)))
    }
}
