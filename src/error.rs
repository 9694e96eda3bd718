//! Error types for the image cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the image cache.
///
/// None of these are fatal to a display unit: the controller maps every
/// variant to the fallback path and renders the original locator.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Transport-level failure while fetching a payload
    #[error("Network error fetching {locator}: {reason}")]
    Network { locator: String, reason: String },

    /// The origin answered with a non-success status
    #[error("Network error fetching {locator}: HTTP {status}")]
    HttpStatus { locator: String, status: u16 },

    /// Empty or missing locator
    #[error("Invalid locator: no image source provided")]
    InvalidLocator,

    /// Bad configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Returns true for both transport failures and non-success statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, CacheError::Network { .. } | CacheError::HttpStatus { .. })
    }
}

// == Result Type Alias ==
/// Convenience Result type for the image cache.
pub type Result<T> = std::result::Result<T, CacheError>;
