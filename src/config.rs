//! Configuration Module
//!
//! Handles loading cache and visibility settings from environment variables.
//! Every default matches the fixed constants in [`crate::cache`] and
//! [`crate::visibility`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CACHE_TTL, MAX_CACHE_SIZE};
use crate::error::{CacheError, Result};
use crate::visibility::{DEFAULT_ROOT_MARGIN, DEFAULT_THRESHOLD};

/// Default `User-Agent` sent by the HTTP fetcher.
pub const DEFAULT_USER_AGENT: &str = concat!("image_cache/", env!("CARGO_PKG_VERSION"));

/// Image cache configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of cached images
    pub max_entries: usize,
    /// Sliding freshness window in seconds
    pub ttl_secs: u64,
    /// Period of the background sweep in seconds
    pub sweep_interval_secs: u64,
    /// Visible fraction an element must reach before loading starts
    pub threshold: f64,
    /// Distance the monitored region extends beyond the viewport
    pub root_margin: f64,
    /// `User-Agent` header for image requests
    pub user_agent: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `IMAGE_CACHE_MAX_ENTRIES` - Maximum cached images (default: 50)
    /// - `IMAGE_CACHE_TTL_SECS` - Freshness window in seconds (default: 300)
    /// - `IMAGE_CACHE_SWEEP_INTERVAL_SECS` - Sweep period (default: the TTL)
    /// - `IMAGE_CACHE_THRESHOLD` - Visibility threshold (default: 0.1)
    /// - `IMAGE_CACHE_ROOT_MARGIN` - Proximity margin (default: 50)
    /// - `IMAGE_CACHE_USER_AGENT` - HTTP user agent
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl_secs = env_or("IMAGE_CACHE_TTL_SECS", defaults.ttl_secs);

        Self {
            max_entries: env_or("IMAGE_CACHE_MAX_ENTRIES", defaults.max_entries),
            ttl_secs,
            sweep_interval_secs: env_or("IMAGE_CACHE_SWEEP_INTERVAL_SECS", ttl_secs),
            threshold: env_or("IMAGE_CACHE_THRESHOLD", defaults.threshold),
            root_margin: env_or("IMAGE_CACHE_ROOT_MARGIN", defaults.root_margin),
            user_agent: env::var("IMAGE_CACHE_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Rejects settings the cache cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::Config("max_entries must be at least 1".to_string()));
        }
        if self.ttl_secs == 0 {
            return Err(CacheError::Config("ttl_secs must be at least 1".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CacheError::Config(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CacheError::Config(format!(
                "threshold must be within 0..=1, got {}",
                self.threshold
            )));
        }
        if !self.root_margin.is_finite() || self.root_margin < 0.0 {
            return Err(CacheError::Config(format!(
                "root_margin must be a non-negative number, got {}",
                self.root_margin
            )));
        }
        Ok(())
    }

    /// Freshness window as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sweep period as a Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: MAX_CACHE_SIZE,
            ttl_secs: CACHE_TTL.as_secs(),
            sweep_interval_secs: CACHE_TTL.as_secs(),
            threshold: DEFAULT_THRESHOLD,
            root_margin: DEFAULT_ROOT_MARGIN,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.ttl_secs, 300);
        assert_eq!(config.sweep_interval_secs, 300);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.root_margin, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("IMAGE_CACHE_MAX_ENTRIES");
        env::remove_var("IMAGE_CACHE_TTL_SECS");
        env::remove_var("IMAGE_CACHE_SWEEP_INTERVAL_SECS");
        env::remove_var("IMAGE_CACHE_THRESHOLD");
        env::remove_var("IMAGE_CACHE_ROOT_MARGIN");
        env::remove_var("IMAGE_CACHE_USER_AGENT");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            max_entries: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));

        let config = Config {
            threshold: 1.5,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));

        let config = Config {
            root_margin: -1.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }
}
