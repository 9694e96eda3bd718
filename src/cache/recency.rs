//! Access Order Module
//!
//! Orders cache keys by last access time for eviction.

use std::collections::{BTreeMap, HashMap};

// == Access Order ==
/// Tracks keys ordered by `(last_accessed, touch sequence)`.
///
/// The smallest timestamp is the eviction candidate. Keys touched at the same
/// millisecond are ordered by the sequence number assigned at touch time, so
/// ties go to the key touched first.
#[derive(Debug, Default)]
pub struct AccessOrder {
    /// Oldest first
    order: BTreeMap<(u64, u64), String>,
    /// Current position of each key in `order`
    positions: HashMap<String, (u64, u64)>,
    next_seq: u64,
}

impl AccessOrder {
    // == Constructor ==
    /// Creates an empty access order.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Records an access to `key` at `now_ms`, replacing any earlier position.
    pub fn touch(&mut self, key: &str, now_ms: u64) {
        self.remove(key);
        let position = (now_ms, self.next_seq);
        self.next_seq += 1;
        self.order.insert(position, key.to_string());
        self.positions.insert(key.to_string(), position);
    }

    // == Remove ==
    /// Stops tracking `key`.
    pub fn remove(&mut self, key: &str) {
        if let Some(position) = self.positions.remove(key) {
            self.order.remove(&position);
        }
    }

    // == Oldest ==
    /// The key with the smallest last access time.
    pub fn oldest(&self) -> Option<&str> {
        self.order.values().next().map(String::as_str)
    }

    // == Stale Keys ==
    /// Keys whose last access is at or before `cutoff_ms`, oldest first.
    pub fn accessed_at_or_before(&self, cutoff_ms: u64) -> Vec<String> {
        self.order
            .range(..=(cutoff_ms, u64::MAX))
            .map(|(_, key)| key.clone())
            .collect()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
        self.positions.clear();
    }
}
