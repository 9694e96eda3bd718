//! Cache Module
//!
//! In-memory image cache with a sliding freshness window and bounded capacity.

mod entry;
mod recency;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use entry::CacheEntry;
pub use recency::AccessOrder;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Maximum number of cached images
pub const MAX_CACHE_SIZE: usize = 50;

/// Sliding freshness window, measured from last access
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
