//! Cache Entry Module
//!
//! Defines a cached image together with its handle and access metadata.

use bytes::Bytes;

use crate::handle::Handle;

// == Cache Entry ==
/// A cached image payload and the single live handle that renders it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Locator the payload was fetched from
    pub key: String,
    /// The fetched bytes, owned by this entry
    pub payload: Bytes,
    /// Renderable reference to `payload`
    pub handle: Handle,
    /// Insertion timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last fresh access (Unix milliseconds)
    pub last_accessed: u64,
    /// Payload length in bytes
    pub size_bytes: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that was last accessed at `now_ms`.
    pub fn new(key: String, payload: Bytes, handle: Handle, now_ms: u64) -> Self {
        let size_bytes = payload.len();
        Self {
            key,
            payload,
            handle,
            created_at: now_ms,
            last_accessed: now_ms,
            size_bytes,
        }
    }

    // == Is Fresh ==
    /// Checks whether the entry is inside its freshness window.
    ///
    /// Boundary condition: once exactly `ttl_ms` has elapsed since the last
    /// access the entry is stale. A clock that moved backwards counts as no
    /// time elapsed.
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_accessed) < ttl_ms
    }

    // == Touch ==
    /// Restarts the freshness window.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_accessed = now_ms;
    }

    // == Time To Live ==
    /// Remaining freshness in milliseconds, 0 once stale.
    pub fn ttl_remaining_ms(&self, now_ms: u64, ttl_ms: u64) -> u64 {
        ttl_ms.saturating_sub(now_ms.saturating_sub(self.last_accessed))
    }
}
