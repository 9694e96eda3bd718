//! Report models
//!
//! Serializable snapshots of cache statistics and display unit state.

pub mod report;

pub use report::{CacheReport, DisplayReport};
