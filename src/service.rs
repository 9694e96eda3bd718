//! Image Cache Service
//!
//! The entry point display units and hosts talk to. Wires the store, the
//! fetcher, and the sweep task together and exposes the cache operations.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::controller::DisplayValue;
use crate::error::{CacheError, Result};
use crate::fetcher::{HttpFetcher, ResourceFetcher};
use crate::handle::{Handle, HandleLifecycle, ObjectUrlRegistry};
use crate::models::CacheReport;
use crate::tasks::{spawn_sweep_task, SweepTask};

// == Image Cache ==
/// Shared image cache.
///
/// Construct one per process (or per test) and hand out `Arc` clones. The
/// background sweep runs between [`ImageCache::init`] and
/// [`ImageCache::shutdown`].
///
/// Concurrent loads of the same locator are not merged: each one fetches,
/// and the later `put` replaces the earlier entry.
pub struct ImageCache {
    store: Arc<RwLock<CacheStore>>,
    lifecycle: Arc<dyn HandleLifecycle>,
    fetcher: Arc<dyn ResourceFetcher>,
    sweep_interval: Duration,
    sweeper: Mutex<Option<SweepTask>>,
}

impl ImageCache {
    // == Constructor ==
    /// Creates a cache around `store`, sweeping once per TTL.
    pub fn new(store: CacheStore, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let sweep_interval = store.ttl();
        let lifecycle = store.lifecycle();
        Self {
            store: Arc::new(RwLock::new(store)),
            lifecycle,
            fetcher,
            sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    /// Creates the production cache: HTTP fetcher, object URL handles, and
    /// the wall clock, sized from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = CacheStore::new(
            config.max_entries,
            config.ttl(),
            Arc::new(ObjectUrlRegistry::default()),
            Arc::new(SystemClock),
        );
        let fetcher = HttpFetcher::new(&config.user_agent)?;

        Ok(Self::new(store, Arc::new(fetcher)).with_sweep_interval(config.sweep_interval()))
    }

    /// Overrides the sweep period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    // == Lifecycle ==
    /// Starts the background sweep. Calling it again while running is a
    /// no-op. Must be called from within a tokio runtime.
    pub fn init(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|p| p.into_inner());
        if sweeper.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        *sweeper = Some(spawn_sweep_task(self.store.clone(), self.sweep_interval));
        info!("Image cache initialized");
    }

    /// Stops the background sweep and releases every cached handle.
    ///
    /// Returns the number of entries that were still cached.
    pub async fn shutdown(&self) -> usize {
        let task = self
            .sweeper
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(task) = task {
            task.stop();
        }

        let released = self.store.write().await.clear();
        info!("Image cache shut down, released {} images", released);
        released
    }

    /// True while the background sweep is scheduled.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // == Preload ==
    /// Returns the payload for `locator`, from cache if fresh, otherwise
    /// fetched and cached.
    ///
    /// # Errors
    /// `InvalidLocator` for an empty locator; a network error if the fetch
    /// fails. Nothing is cached on failure.
    pub async fn preload_image(&self, locator: &str) -> Result<Bytes> {
        self.load(locator).await.map(|(_, payload)| payload)
    }

    // == Cached URL ==
    /// Returns a renderable handle if a fresh entry exists, otherwise the
    /// locator unchanged. Never fetches.
    pub async fn get_cached_url(&self, locator: &str) -> String {
        match self.store.write().await.get(locator) {
            Some(entry) => entry.handle.to_string(),
            None => locator.to_string(),
        }
    }

    // == Resolve ==
    /// Produces the value a display unit should show for `locator`.
    ///
    /// Every failure degrades to the locator itself.
    pub async fn resolve(&self, locator: &str) -> DisplayValue {
        match self.load(locator).await {
            Ok((handle, _)) => DisplayValue::Cached(handle),
            Err(_) => DisplayValue::Fallback(locator.to_string()),
        }
    }

    /// True while `handle` still refers to a cached payload.
    pub fn is_live(&self, handle: &Handle) -> bool {
        self.lifecycle.is_live(handle)
    }

    // == Clean ==
    /// Runs a sweep now. Returns the number of entries removed.
    pub async fn clean_cache(&self) -> usize {
        self.store.write().await.sweep()
    }

    /// Releases every handle and empties the cache.
    pub async fn clear(&self) -> usize {
        self.store.write().await.clear()
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn report(&self) -> CacheReport {
        CacheReport::new(&self.stats().await)
    }

    /// Shared store, for hosts that schedule their own maintenance.
    pub fn store(&self) -> Arc<RwLock<CacheStore>> {
        self.store.clone()
    }

    /// Cache hit or fetch-and-put. The store lock is not held while fetching.
    async fn load(&self, locator: &str) -> Result<(Handle, Bytes)> {
        if locator.trim().is_empty() {
            return Err(CacheError::InvalidLocator);
        }

        if let Some(entry) = self.store.write().await.get(locator) {
            return Ok((entry.handle.clone(), entry.payload.clone()));
        }

        let payload = self.fetcher.fetch(locator).await.map_err(|e| {
            warn!("Error caching image: {}", e);
            e
        })?;

        let mut store = self.store.write().await;
        let entry = store.put(locator.to_string(), payload);
        Ok((entry.handle.clone(), entry.payload.clone()))
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("sweep_interval", &self.sweep_interval)
            .field("sweeping", &self.is_sweeping())
            .finish_non_exhaustive()
    }
}
