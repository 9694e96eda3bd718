//! Sweep Task
//!
//! Background task that periodically removes stale cache entries and
//! releases their handles, independent of request traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Running sweep loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct SweepTask {
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Stops the loop. A sweep already holding the store lock finishes first.
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a task that sweeps `cache` every `interval`.
///
/// The first sweep runs one full interval after spawning. Must be called
/// from within a tokio runtime.
pub fn spawn_sweep_task(cache: Arc<RwLock<CacheStore>>, interval: Duration) -> SweepTask {
    let handle = tokio::spawn(async move {
        info!("Starting image cache sweep every {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut store = cache.write().await;
                store.sweep()
            };

            if removed == 0 {
                debug!("Sweep found no stale images");
            }
        }
    });

    SweepTask { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::handle::ObjectUrlRegistry;
    use bytes::Bytes;

    const TTL: Duration = Duration::from_secs(300);

    fn shared_store() -> (Arc<RwLock<CacheStore>>, Arc<ObjectUrlRegistry>, Arc<ManualClock>) {
        let registry = Arc::new(ObjectUrlRegistry::new("sweep"));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let store = CacheStore::new(10, TTL, registry.clone(), clock.clone());
        (Arc::new(RwLock::new(store)), registry, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_removes_stale_entries() {
        let (cache, registry, clock) = shared_store();
        cache
            .write()
            .await
            .put("stale.png".to_string(), Bytes::from_static(b"png"));

        let task = spawn_sweep_task(cache.clone(), TTL);

        clock.advance(TTL + Duration::from_millis(1));
        tokio::time::sleep(TTL + Duration::from_millis(10)).await;

        assert!(cache.read().await.is_empty());
        assert_eq!(registry.live_count(), 0);
        task.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_preserves_fresh_entries() {
        let (cache, registry, clock) = shared_store();
        cache
            .write()
            .await
            .put("fresh.png".to_string(), Bytes::from_static(b"png"));

        let task = spawn_sweep_task(cache.clone(), TTL);

        clock.advance(TTL - Duration::from_millis(1));
        tokio::time::sleep(TTL + Duration::from_millis(10)).await;

        assert_eq!(cache.read().await.len(), 1);
        assert_eq!(registry.live_count(), 1);
        task.stop();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_stopped() {
        let (cache, _, _) = shared_store();

        let task = spawn_sweep_task(cache, TTL);
        task.stop();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(task.is_finished(), "Task should be finished after stop");
    }
}
