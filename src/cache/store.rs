//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with access-order tracking,
//! a sliding freshness window, and handle release on every removal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::{AccessOrder, CacheEntry, CacheStats, CACHE_TTL, MAX_CACHE_SIZE};
use crate::clock::{Clock, SystemClock};
use crate::handle::{HandleLifecycle, ObjectUrlRegistry};

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Evicted,
    Expired,
    Replaced,
    Cleared,
}

// == Cache Store ==
/// Image cache with least-recently-accessed eviction and sliding TTL.
///
/// Every entry owns exactly one handle obtained from the store's
/// [`HandleLifecycle`]. The store releases that handle whenever the entry is
/// evicted, replaced, swept, or cleared, and before any replacement entry is
/// registered.
#[derive(Debug)]
pub struct CacheStore {
    /// Locator to entry
    entries: HashMap<String, CacheEntry>,
    /// Eviction order by last access
    order: AccessOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Freshness window in milliseconds
    ttl_ms: u64,
    /// Sum of payload sizes
    total_bytes: usize,
    lifecycle: Arc<dyn HandleLifecycle>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries, at least 1
    /// * `ttl` - Sliding freshness window
    /// * `lifecycle` - Issues and reclaims entry handles
    /// * `clock` - Time source for freshness checks
    pub fn new(
        max_entries: usize,
        ttl: Duration,
        lifecycle: Arc<dyn HandleLifecycle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            order: AccessOrder::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            ttl_ms: ttl.as_millis() as u64,
            total_bytes: 0,
            lifecycle,
            clock,
        }
    }

    /// Creates a store with the production limits, the default object URL
    /// registry, and the wall clock.
    pub fn with_defaults() -> Self {
        Self::new(
            MAX_CACHE_SIZE,
            CACHE_TTL,
            Arc::new(ObjectUrlRegistry::default()),
            Arc::new(SystemClock),
        )
    }

    // == Get ==
    /// Returns the entry for `key` if present and fresh.
    ///
    /// A hit restarts the entry's freshness window. A stale entry counts as a
    /// miss and is removed right away, releasing its handle.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        let now = self.clock.now_ms();

        let fresh = match self.entries.get(key) {
            Some(entry) => entry.is_fresh(now, self.ttl_ms),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if !fresh {
            self.remove_entry(key, Removal::Expired);
            self.stats.record_miss();
            return None;
        }

        self.stats.record_hit();
        self.order.touch(key, now);
        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        Some(&*entry)
    }

    // == Peek ==
    /// Returns the entry for `key` regardless of freshness, without touching
    /// it or counting a lookup.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Put ==
    /// Caches `payload` under `key` and returns the new entry.
    ///
    /// An existing entry for the same key is replaced. Otherwise, when the
    /// store is full, the entry with the oldest last access is evicted first.
    /// The outgoing handle is always released before the new one is acquired.
    pub fn put(&mut self, key: String, payload: Bytes) -> &CacheEntry {
        if self.entries.contains_key(&key) {
            debug!("Replacing cached image {}", key);
            self.remove_entry(&key, Removal::Replaced);
        } else if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.order.oldest().map(str::to_string) {
                debug!("Cache full, evicting least recently accessed image {}", oldest);
                self.remove_entry(&oldest, Removal::Evicted);
            }
        }

        let now = self.clock.now_ms();
        let handle = self.lifecycle.acquire(&payload);
        let entry = CacheEntry::new(key.clone(), payload, handle, now);

        self.total_bytes += entry.size_bytes;
        self.order.touch(&key, now);
        self.entries.insert(key.clone(), entry);
        self.stats.set_occupancy(self.entries.len(), self.total_bytes);

        &self.entries[&key]
    }

    // == Sweep ==
    /// Removes every entry whose freshness window has run out.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let cutoff = match now.checked_sub(self.ttl_ms) {
            Some(cutoff) => cutoff,
            None => return 0,
        };

        let stale = self.order.accessed_at_or_before(cutoff);
        let count = stale.len();
        for key in stale {
            self.remove_entry(&key, Removal::Expired);
        }

        if count > 0 {
            info!("Swept {} stale images, {} remain", count, self.entries.len());
        }
        count
    }

    // == Clear ==
    /// Releases every handle and empties the store.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let keys: Vec<String> = self.entries.keys().cloned().collect();
        let count = keys.len();
        for key in keys {
            self.remove_entry(&key, Removal::Cleared);
        }
        self.order.clear();
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_occupancy(self.entries.len(), self.total_bytes);
        stats
    }

    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Freshness window.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Lifecycle that issued this store's handles.
    pub fn lifecycle(&self) -> Arc<dyn HandleLifecycle> {
        self.lifecycle.clone()
    }

    // == Remove Entry ==
    /// Drops `key` from every index and releases its handle.
    fn remove_entry(&mut self, key: &str, reason: Removal) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(key);
        self.total_bytes -= entry.size_bytes;
        self.lifecycle.release(&entry.handle);

        match reason {
            Removal::Evicted => self.stats.record_eviction(),
            Removal::Expired => self.stats.record_expiration(),
            Removal::Replaced => self.stats.record_replacement(),
            Removal::Cleared => {}
        }
        self.stats.set_occupancy(self.entries.len(), self.total_bytes);

        Some(entry)
    }
}

impl Drop for CacheStore {
    fn drop(&mut self) {
        self.clear();
    }
}
