//! Image Cache demo
//!
//! Lays the image URLs given on the command line out as a vertical list,
//! scrolls a viewport down across it, and loads each image once it comes
//! into view. Prints what every list item ended up showing plus the cache
//! statistics as JSON.
//!
//! # Usage
//! ```text
//! RUST_LOG=image_cache=debug image_cache https://example.com/a.jpg https://example.com/b.jpg
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_cache::models::{CacheReport, DisplayReport};
use image_cache::visibility::Entered;
use image_cache::{CachedImage, Config, ImageCache, ObserveOptions, Rect, VisibilityGate};

const VIEWPORT_WIDTH: f64 = 400.0;
const VIEWPORT_HEIGHT: f64 = 800.0;
const ITEM_HEIGHT: f64 = 300.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let locators: Vec<String> = std::env::args().skip(1).collect();
    if locators.is_empty() {
        bail!("usage: image_cache <image-url>...");
    }

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, ttl={}s, sweep_interval={}s",
        config.max_entries, config.ttl_secs, config.sweep_interval_secs
    );
    info!(
        "Visibility: threshold={}, root_margin={}",
        config.threshold, config.root_margin
    );

    let cache = Arc::new(ImageCache::from_config(&config).context("invalid configuration")?);
    cache.init();

    let options = ObserveOptions {
        threshold: config.threshold,
        root_margin: config.root_margin,
    };
    let mut gate = VisibilityGate::new();
    let mut units: Vec<(CachedImage, Entered)> = locators
        .iter()
        .enumerate()
        .map(|(i, locator)| {
            let bounds = Rect::new(0.0, i as f64 * ITEM_HEIGHT, VIEWPORT_WIDTH, ITEM_HEIGHT);
            let (_, entered) = gate.observe(bounds, options);
            (CachedImage::new(cache.clone(), locator.clone()), entered)
        })
        .collect();

    let content_height = locators.len() as f64 * ITEM_HEIGHT;
    let mut offset = 0.0;
    while offset < content_height {
        let fired = gate.set_viewport(Rect::new(0.0, offset, VIEWPORT_WIDTH, VIEWPORT_HEIGHT));
        info!("Viewport at {}: {} items came into view", offset, fired.len());

        let mut loads = JoinSet::new();
        for (index, (image, entered)) in units.iter_mut().enumerate() {
            if entered.try_entered() != Some(true) {
                continue;
            }
            if let Some(pending) = image.enter_viewport() {
                loads.spawn(async move { (index, pending.run().await) });
            }
        }
        while let Some(joined) = loads.join_next().await {
            let (index, resolution) = joined.context("image load task failed")?;
            units[index].0.apply(resolution);
        }

        offset += VIEWPORT_HEIGHT / 2.0;
    }

    // Revisiting the list is served from cache
    for locator in &locators {
        let src = cache.get_cached_url(locator).await;
        info!("Revisit {} -> {}", locator, src);
    }

    let displays: Vec<DisplayReport> = units
        .iter()
        .map(|(image, _)| DisplayReport::new(image))
        .collect();
    println!("{}", serde_json::to_string_pretty(&displays)?);

    let report: CacheReport = cache.report().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    cache.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
