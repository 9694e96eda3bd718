//! Image Cache - viewport-gated image loading with a bounded in-memory cache
//!
//! Images are fetched only once their display unit comes near the viewport,
//! cached under a sliding freshness window with least-recently-accessed
//! eviction, and rendered through short-lived handles that are released as
//! soon as their entry leaves the cache.

pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod handle;
pub mod models;
pub mod service;
pub mod tasks;
pub mod visibility;

pub use config::Config;
pub use controller::{CachedImage, DisplayValue, LoadState};
pub use error::{CacheError, Result};
pub use service::ImageCache;
pub use visibility::{ObserveOptions, Rect, VisibilityGate};
