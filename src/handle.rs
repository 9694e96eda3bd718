//! Handle Lifecycle Module
//!
//! Turns cached payloads into short-lived renderable references and reclaims
//! them when their cache entry goes away.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

// == Handle ==
/// Ephemeral, revocable reference to a cached payload, suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Wraps an already-issued reference string.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as it would be handed to a renderer.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Handle Lifecycle Trait ==
/// Host mechanism for allocating and reclaiming local references to payloads.
pub trait HandleLifecycle: Send + Sync + fmt::Debug {
    /// Allocates a renderable reference to `payload`.
    fn acquire(&self, payload: &Bytes) -> Handle;

    /// Reclaims `handle`. Returns false when it was already released, which
    /// is a no-op.
    fn release(&self, handle: &Handle) -> bool;

    /// True while `handle` has been acquired and not yet released.
    fn is_live(&self, handle: &Handle) -> bool;
}

// == Object URL Registry ==
/// Default lifecycle issuing `blob:` style URLs backed by an in-memory table.
#[derive(Debug)]
pub struct ObjectUrlRegistry {
    origin: String,
    live: Mutex<HashMap<Handle, Bytes>>,
}

impl ObjectUrlRegistry {
    /// Creates a registry whose URLs look like `blob:<origin>/<uuid>`.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the payload behind a live handle, or None once released.
    pub fn resolve(&self, handle: &Handle) -> Option<Bytes> {
        self.table().get(handle).cloned()
    }

    /// Number of handles acquired and not yet released.
    pub fn live_count(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Handle, Bytes>> {
        // The table holds no invariant a panicking holder could break
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new("image-cache")
    }
}

impl HandleLifecycle for ObjectUrlRegistry {
    fn acquire(&self, payload: &Bytes) -> Handle {
        let handle = Handle(format!("blob:{}/{}", self.origin, Uuid::new_v4()));
        self.table().insert(handle.clone(), payload.clone());
        handle
    }

    fn release(&self, handle: &Handle) -> bool {
        let released = self.table().remove(handle).is_some();
        if !released {
            debug!("Ignoring release of already released handle {}", handle);
        }
        released
    }

    fn is_live(&self, handle: &Handle) -> bool {
        self.table().contains_key(handle)
    }
}
