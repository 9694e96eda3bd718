//! Cached Image Controller
//!
//! Per-display-unit state machine: `Idle` until the unit comes into view,
//! `Pending` while the cache resolves it, `Ready` once there is something to
//! show. Every load carries the unit's request sequence number so a
//! resolution that arrives after the unit moved on is dropped.

use std::sync::Arc;

use tracing::debug;

use crate::handle::Handle;
use crate::service::ImageCache;
use crate::visibility::Entered;

/// Transparent 1x1 GIF shown until a unit is ready.
pub const PLACEHOLDER_IMAGE: &str =
    "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

// == Display Value ==
/// What a ready unit renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    /// Handle to the cached payload
    Cached(Handle),
    /// The original locator, after any failure
    Fallback(String),
}

impl DisplayValue {
    pub fn as_str(&self) -> &str {
        match self {
            DisplayValue::Cached(handle) => handle.as_str(),
            DisplayValue::Fallback(locator) => locator,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, DisplayValue::Cached(_))
    }
}

// == Load State ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Not yet in view
    Idle,
    /// In view, waiting for the cache
    Pending,
    /// Resolved; terminal until the locator changes
    ///
    /// A cached handle here may since have been released by the cache;
    /// [`CachedImage::value`] reports the locator in that case.
    Ready(DisplayValue),
}

// == Pending Load ==
/// A load started by [`CachedImage::enter_viewport`].
///
/// It owns everything it needs, so it can run on another task and keeps
/// running (and populating the cache) even if its unit is torn down.
#[derive(Debug)]
pub struct PendingLoad {
    sequence: u64,
    locator: String,
    cache: Arc<ImageCache>,
}

impl PendingLoad {
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Resolves through the cache, fetching on a miss.
    pub async fn run(self) -> Resolution {
        let value = self.cache.resolve(&self.locator).await;
        Resolution {
            sequence: self.sequence,
            value,
        }
    }
}

/// Outcome of a [`PendingLoad`], to be applied to the unit that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    sequence: u64,
    value: DisplayValue,
}

impl Resolution {
    pub fn value(&self) -> &DisplayValue {
        &self.value
    }
}

// == Cached Image ==
/// One display unit bound to a locator.
#[derive(Debug)]
pub struct CachedImage {
    locator: String,
    state: LoadState,
    sequence: u64,
    cache: Arc<ImageCache>,
}

impl CachedImage {
    pub fn new(cache: Arc<ImageCache>, locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            state: LoadState::Idle,
            sequence: 0,
            cache,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Current request sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_loading(&self) -> bool {
        !matches!(self.state, LoadState::Ready(_))
    }

    /// The resolved value, once ready.
    ///
    /// A handle the cache has released since degrades to the locator.
    pub fn value(&self) -> Option<DisplayValue> {
        match &self.state {
            LoadState::Ready(DisplayValue::Cached(handle)) if !self.cache.is_live(handle) => {
                Some(DisplayValue::Fallback(self.locator.clone()))
            }
            LoadState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// What to hand the renderer right now.
    pub fn display_src(&self) -> &str {
        match &self.state {
            LoadState::Ready(DisplayValue::Cached(handle)) if !self.cache.is_live(handle) => {
                &self.locator
            }
            LoadState::Ready(value) => value.as_str(),
            _ => PLACEHOLDER_IMAGE,
        }
    }

    // == Transitions ==
    /// `Idle -> Pending`. Returns the load to run, or None if the unit was
    /// not idle.
    pub fn enter_viewport(&mut self) -> Option<PendingLoad> {
        if self.state != LoadState::Idle {
            return None;
        }

        self.sequence += 1;
        self.state = LoadState::Pending;
        Some(PendingLoad {
            sequence: self.sequence,
            locator: self.locator.clone(),
            cache: self.cache.clone(),
        })
    }

    /// `Pending -> Ready`. Returns false and changes nothing when the
    /// resolution belongs to an earlier request.
    pub fn apply(&mut self, resolution: Resolution) -> bool {
        if self.state != LoadState::Pending || resolution.sequence != self.sequence {
            debug!(
                "Discarding stale resolution #{} for {} (current #{})",
                resolution.sequence, self.locator, self.sequence
            );
            return false;
        }

        self.state = LoadState::Ready(resolution.value);
        true
    }

    /// Points the unit at a new locator and restarts from `Idle`.
    ///
    /// Setting the same locator again changes nothing.
    pub fn set_locator(&mut self, locator: impl Into<String>) {
        let locator = locator.into();
        if locator == self.locator {
            return;
        }

        self.locator = locator;
        self.sequence += 1;
        self.state = LoadState::Idle;
    }

    // == Driving ==
    /// Enters the viewport and resolves in place.
    pub async fn load(&mut self) -> Option<DisplayValue> {
        if let Some(pending) = self.enter_viewport() {
            let resolution = pending.run().await;
            self.apply(resolution);
        }
        self.value()
    }

    /// Waits for the visibility signal, then loads.
    ///
    /// Returns None and stays `Idle` if the observation was cancelled.
    pub async fn load_when_visible(&mut self, entered: Entered) -> Option<DisplayValue> {
        if !entered.await {
            return None;
        }
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::clock::ManualClock;
    use crate::fetcher::StaticFetcher;
    use crate::handle::ObjectUrlRegistry;
    use crate::visibility::{ObserveOptions, Rect, VisibilityGate};
    use std::time::Duration;

    fn cache_with(fetcher: StaticFetcher) -> (Arc<ImageCache>, Arc<ObjectUrlRegistry>) {
        let registry = Arc::new(ObjectUrlRegistry::new("ctl"));
        let store = CacheStore::new(
            50,
            Duration::from_secs(300),
            registry.clone(),
            Arc::new(ManualClock::new(1_000_000)),
        );
        (Arc::new(ImageCache::new(store, Arc::new(fetcher))), registry)
    }

    #[tokio::test]
    async fn test_idle_shows_placeholder() {
        let (cache, _) = cache_with(StaticFetcher::new());
        let image = CachedImage::new(cache, "https://img/a.png");

        assert_eq!(image.state(), &LoadState::Idle);
        assert!(image.is_loading());
        assert_eq!(image.display_src(), PLACEHOLDER_IMAGE);
    }

    #[tokio::test]
    async fn test_load_success_uses_handle() {
        let (cache, registry) =
            cache_with(StaticFetcher::new().with("https://img/a.png", &b"a"[..]));
        let mut image = CachedImage::new(cache, "https://img/a.png");

        let value = image.load().await.unwrap();

        assert!(value.is_cached());
        assert!(!image.is_loading());
        assert_eq!(image.display_src(), value.as_str());
        assert_eq!(registry.live_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_locator() {
        let (cache, _) = cache_with(StaticFetcher::new());
        let mut image = CachedImage::new(cache, "https://img/broken.png");

        image.load().await;

        assert_eq!(
            image.state(),
            &LoadState::Ready(DisplayValue::Fallback("https://img/broken.png".to_string()))
        );
        assert_eq!(image.display_src(), "https://img/broken.png");
    }

    #[tokio::test]
    async fn test_ready_is_terminal() {
        let fetcher = StaticFetcher::new();
        let (cache, _) = cache_with(fetcher);
        let mut image = CachedImage::new(cache, "https://img/broken.png");

        image.load().await;
        assert!(image.enter_viewport().is_none());
        assert!(!image.is_loading());
    }

    #[tokio::test]
    async fn test_stale_resolution_is_discarded() {
        let (cache, _) = cache_with(
            StaticFetcher::new()
                .with("https://img/old.png", &b"old"[..])
                .with("https://img/new.png", &b"new"[..]),
        );
        let mut image = CachedImage::new(cache, "https://img/old.png");

        let old_load = image.enter_viewport().unwrap();
        image.set_locator("https://img/new.png");
        assert_eq!(image.state(), &LoadState::Idle);

        let new_load = image.enter_viewport().unwrap();
        assert_eq!(new_load.locator(), "https://img/new.png");

        // The old request finishes last but must not win
        let new_resolution = new_load.run().await;
        let old_resolution = old_load.run().await;

        assert!(image.apply(new_resolution.clone()));
        assert!(!image.apply(old_resolution));
        assert_eq!(image.value().as_ref(), Some(new_resolution.value()));
    }

    #[tokio::test]
    async fn test_same_locator_keeps_state() {
        let (cache, _) = cache_with(StaticFetcher::new().with("https://img/a.png", &b"a"[..]));
        let mut image = CachedImage::new(cache, "https://img/a.png");

        image.load().await;
        let sequence = image.sequence();
        image.set_locator("https://img/a.png");

        assert_eq!(image.sequence(), sequence);
        assert!(image.value().is_some());
    }

    #[tokio::test]
    async fn test_torn_down_unit_still_populates_cache() {
        let (cache, registry) =
            cache_with(StaticFetcher::new().with("https://img/a.png", &b"a"[..]));
        let mut image = CachedImage::new(cache.clone(), "https://img/a.png");

        let pending = image.enter_viewport().unwrap();
        drop(image);
        pending.run().await;

        assert_eq!(registry.live_count(), 1);
        assert!(cache.get_cached_url("https://img/a.png").await.starts_with("blob:ctl/"));
    }

    #[tokio::test]
    async fn test_evicted_handle_degrades_to_locator() {
        let registry = Arc::new(ObjectUrlRegistry::new("ctl"));
        let store = CacheStore::new(
            1,
            Duration::from_secs(300),
            registry.clone(),
            Arc::new(ManualClock::new(1_000_000)),
        );
        let fetcher = StaticFetcher::new()
            .with("https://img/a.png", &b"a"[..])
            .with("https://img/b.png", &b"b"[..]);
        let cache = Arc::new(ImageCache::new(store, Arc::new(fetcher)));

        let mut first = CachedImage::new(cache.clone(), "https://img/a.png");
        let Some(DisplayValue::Cached(handle)) = first.load().await else {
            panic!("expected a cached handle");
        };
        assert_eq!(first.display_src(), handle.as_str());

        // Capacity one: loading a second image evicts the first entry
        let mut second = CachedImage::new(cache, "https://img/b.png");
        assert!(second.load().await.is_some_and(|v| v.is_cached()));

        assert!(registry.resolve(&handle).is_none());
        assert_eq!(first.display_src(), "https://img/a.png");
        assert_eq!(
            first.value(),
            Some(DisplayValue::Fallback("https://img/a.png".to_string()))
        );
        assert!(!first.is_loading());
        assert!(first.enter_viewport().is_none());
    }

    #[tokio::test]
    async fn test_load_when_visible() {
        let (cache, _) = cache_with(StaticFetcher::new().with("https://img/a.png", &b"a"[..]));
        let mut gate = VisibilityGate::new();
        let mut image = CachedImage::new(cache, "https://img/a.png");

        let bounds = Rect::new(0.0, 900.0, 300.0, 200.0);
        let (_, entered) = gate.observe(bounds, ObserveOptions::default());
        gate.set_viewport(Rect::new(0.0, 500.0, 300.0, 600.0));

        let value = image.load_when_visible(entered).await;
        assert!(value.is_some_and(|v| v.is_cached()));
    }

    #[tokio::test]
    async fn test_cancelled_observation_stays_idle() {
        let (cache, _) = cache_with(StaticFetcher::new());
        let mut gate = VisibilityGate::new();
        let mut image = CachedImage::new(cache, "https://img/a.png");

        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        let (id, entered) = gate.observe(bounds, ObserveOptions::default());
        gate.unobserve(id);

        assert!(image.load_when_visible(entered).await.is_none());
        assert_eq!(image.state(), &LoadState::Idle);
    }
}
