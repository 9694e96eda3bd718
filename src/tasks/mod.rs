//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - Sweep: Removes stale images once per freshness window

mod sweep;

pub use sweep::{spawn_sweep_task, SweepTask};
