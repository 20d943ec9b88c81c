//! Crawl frontier: the visited set and the bounded pending queue
//!
//! An id is marked visited the moment it is dequeued, before any processing
//! happens, so a failed item is never picked up again through discovery.
//! Only [`CrawlFrontier::seed`] bypasses the visited check.
//!
//! The per-batch limit of [`CrawlFrontier::enqueue_many`] counts newly queued
//! ids only. A candidate that is already pending, visited or refused for
//! capacity does not use up a slot, so a batch full of known ids still lets
//! the fresh ones behind it through.

use crate::item::ItemId;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};

/// Which pending id `dequeue` hands out next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionOrder {
    /// Whatever the hash set yields first; differs between runs
    #[default]
    Arbitrary,
    /// Insertion order, for reproducible crawls
    Fifo,
}

/// Limits applied by the frontier
#[derive(Debug, Clone, Copy)]
pub struct FrontierSettings {
    /// Maximum number of pending ids
    pub capacity: usize,
    /// Maximum number of ids accepted per `enqueue_many` call
    pub batch_limit: usize,
    pub order: ExtractionOrder,
}

impl Default for FrontierSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            batch_limit: 10,
            order: ExtractionOrder::Arbitrary,
        }
    }
}

#[derive(Debug)]
pub struct CrawlFrontier {
    visited: HashSet<ItemId>,
    pending: VecDeque<ItemId>,
    queued: HashSet<ItemId>,
    settings: FrontierSettings,
}

impl CrawlFrontier {
    /// Creates a frontier whose visited set starts as `already_visited`
    pub fn new(already_visited: HashSet<ItemId>, settings: FrontierSettings) -> Self {
        Self {
            visited: already_visited,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            settings,
        }
    }

    /// Adds `id` even if it was visited before
    pub fn seed(&mut self, id: ItemId) -> bool {
        self.insert(id, true)
    }

    /// Adds `id` unless the queue is full or the id was already visited
    pub fn enqueue(&mut self, id: ItemId) -> bool {
        self.insert(id, false)
    }

    /// Enqueues candidates until `batch_limit` of them were accepted
    ///
    /// Candidates past the limit are dropped, not deferred. Returns the number
    /// of ids actually added.
    pub fn enqueue_many<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut added = 0;
        for id in ids {
            if added >= self.settings.batch_limit {
                break;
            }
            if self.enqueue(id) {
                added += 1;
            }
        }

        tracing::debug!("{} ids added, {} pending", added, self.pending.len());
        added
    }

    fn insert(&mut self, id: ItemId, force: bool) -> bool {
        if self.pending.len() >= self.settings.capacity {
            tracing::trace!(id = %id, "Frontier full, dropping id");
            return false;
        }
        if !force && self.visited.contains(&id) {
            return false;
        }
        if !self.queued.insert(id.clone()) {
            return false;
        }

        tracing::debug!(id = %id, pending = self.pending.len() + 1, "New id queued");
        self.pending.push_back(id);
        true
    }

    /// Removes the next pending id and marks it visited
    pub fn dequeue(&mut self) -> Option<ItemId> {
        let id = match self.settings.order {
            ExtractionOrder::Fifo => self.pending.pop_front()?,
            ExtractionOrder::Arbitrary => {
                let id = self.queued.iter().next()?.clone();
                let index = self.pending.iter().position(|p| p == &id)?;
                self.pending.remove(index)?
            }
        };

        self.queued.remove(&id);
        self.visited.insert(id.clone());
        Some(id)
    }

    pub fn is_visited(&self, id: &ItemId) -> bool {
        self.visited.contains(id)
    }

    pub fn is_pending(&self, id: &ItemId) -> bool {
        self.queued.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(range: std::ops::Range<u64>) -> Vec<ItemId> {
        range.map(ItemId::from).collect()
    }

    fn frontier_with(settings: FrontierSettings) -> CrawlFrontier {
        CrawlFrontier::new(HashSet::new(), settings)
    }

    #[test]
    fn test_enqueue_visited_is_noop() {
        let visited: HashSet<ItemId> = ids(0..3).into_iter().collect();
        let mut frontier = CrawlFrontier::new(visited, FrontierSettings::default());

        assert!(!frontier.enqueue(ItemId::from(1)));
        assert_eq!(frontier.pending_len(), 0);

        assert!(frontier.enqueue(ItemId::from(7)));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_seed_bypasses_visited() {
        let visited: HashSet<ItemId> = ids(0..1).into_iter().collect();
        let mut frontier = CrawlFrontier::new(visited, FrontierSettings::default());

        assert!(frontier.seed(ItemId::from(0)));
        assert_eq!(frontier.dequeue(), Some(ItemId::from(0)));
    }

    #[test]
    fn test_dequeue_marks_visited_immediately() {
        let mut frontier = frontier_with(FrontierSettings::default());
        frontier.enqueue(ItemId::from(5));

        let id = frontier.dequeue().unwrap();
        assert!(frontier.is_visited(&id));
        assert!(!frontier.is_pending(&id));

        // Whatever happens to the item afterwards, it cannot come back.
        assert!(!frontier.enqueue(id));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_dequeue_empty() {
        let mut frontier = frontier_with(FrontierSettings::default());
        assert_eq!(frontier.dequeue(), None);
    }

    #[test]
    fn test_capacity_is_a_silent_limit() {
        let mut frontier = frontier_with(FrontierSettings {
            capacity: 2,
            ..FrontierSettings::default()
        });

        assert!(frontier.enqueue(ItemId::from(1)));
        assert!(frontier.enqueue(ItemId::from(2)));
        assert!(!frontier.enqueue(ItemId::from(3)));
        assert!(!frontier.seed(ItemId::from(4)));
        assert_eq!(frontier.pending_len(), 2);
    }

    #[test]
    fn test_enqueue_many_pending_ids_use_no_slot() {
        let mut frontier = frontier_with(FrontierSettings {
            batch_limit: 2,
            ..FrontierSettings::default()
        });
        frontier.enqueue(ItemId::from(1));

        let added = frontier.enqueue_many(ids(1..2).into_iter().chain(ids(1..4)));

        assert_eq!(added, 2);
        assert_eq!(frontier.pending_len(), 3);
        assert!(frontier.is_pending(&ItemId::from(3)));
    }

    #[test]
    fn test_enqueue_many_respects_batch_limit() {
        let mut frontier = frontier_with(FrontierSettings::default());

        let added = frontier.enqueue_many(ids(100..115));
        assert_eq!(added, 10);
        assert_eq!(frontier.pending_len(), 10);
    }

    #[test]
    fn test_enqueue_many_skips_rejected_without_counting() {
        let visited: HashSet<ItemId> = ids(0..5).into_iter().collect();
        let mut frontier = CrawlFrontier::new(
            visited,
            FrontierSettings {
                batch_limit: 3,
                ..FrontierSettings::default()
            },
        );

        let added = frontier.enqueue_many(ids(0..10));
        assert_eq!(added, 3);
        for id in ids(5..8) {
            assert!(frontier.is_pending(&id));
        }
    }

    #[test]
    fn test_duplicate_pending_not_added_twice() {
        let mut frontier = frontier_with(FrontierSettings::default());
        assert!(frontier.enqueue(ItemId::from(1)));
        assert!(!frontier.enqueue(ItemId::from(1)));
        assert_eq!(frontier.pending_len(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = frontier_with(FrontierSettings {
            order: ExtractionOrder::Fifo,
            ..FrontierSettings::default()
        });
        frontier.enqueue_many(ids(1..4));

        assert_eq!(frontier.dequeue(), Some(ItemId::from(1)));
        assert_eq!(frontier.dequeue(), Some(ItemId::from(2)));
        assert_eq!(frontier.dequeue(), Some(ItemId::from(3)));
        assert_eq!(frontier.dequeue(), None);
    }

    #[test]
    fn test_arbitrary_order_drains_everything() {
        let mut frontier = frontier_with(FrontierSettings::default());
        frontier.enqueue_many(ids(1..6));

        let mut seen = HashSet::new();
        while let Some(id) = frontier.dequeue() {
            seen.insert(id);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(frontier.visited_len(), 5);
    }
}
