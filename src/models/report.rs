//! Report DTOs
//!
//! Serializable snapshots of cache and display state, printed as JSON by the
//! demo binary.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::controller::{CachedImage, LoadState};

/// Snapshot of cache statistics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    /// Lookups answered from a fresh entry
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Capacity evictions
    pub evictions: u64,
    /// Entries dropped after their freshness window ran out
    pub expirations: u64,
    /// Entries overwritten for the same locator
    pub replacements: u64,
    /// Current number of cached images
    pub total_entries: usize,
    /// Sum of cached payload sizes
    pub total_bytes: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// Current timestamp in ISO 8601 format
    pub generated_at: String,
}

impl CacheReport {
    /// Creates a report from cache statistics, stamped with the current time.
    pub fn new(stats: &CacheStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            replacements: stats.replacements,
            total_entries: stats.total_entries,
            total_bytes: stats.total_bytes,
            hit_rate: stats.hit_rate(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// What one display unit ended up showing.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayReport {
    /// Locator the unit was configured with
    pub locator: String,
    /// "idle", "pending", "cached", or "fallback"
    pub state: &'static str,
    /// Value handed to the renderer
    pub src: String,
}

impl DisplayReport {
    pub fn new(image: &CachedImage) -> Self {
        let state = match (image.state(), image.value()) {
            (LoadState::Idle, _) => "idle",
            (LoadState::Pending, _) => "pending",
            (_, Some(value)) if value.is_cached() => "cached",
            _ => "fallback",
        };
        Self {
            locator: image.locator().to_string(),
            state,
            src: image.display_src().to_string(),
        }
    }
}
