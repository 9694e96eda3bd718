//! Cache Statistics Module
//!
//! Tracks hits, misses, and every way an entry can leave the cache.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Entries removed to make room for a new one
    pub evictions: u64,
    /// Entries removed because their freshness window ran out
    pub expirations: u64,
    /// Entries overwritten by a second insert for the same locator
    pub replacements: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Sum of cached payload sizes
    pub total_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.expirations += 1;
    }

    pub fn record_replacement(&mut self) {
        self.replacements += 1;
    }

    // == Update Occupancy ==
    /// Updates the entry count and byte total.
    pub fn set_occupancy(&mut self, entries: usize, bytes: usize) {
        self.total_entries = entries;
        self.total_bytes = bytes;
    }
}
