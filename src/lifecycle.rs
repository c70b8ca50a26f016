//! Artifact lifetime management: deferred deletion and the periodic sweep.
//!
//! Job-scoped cleanup (the repacker deleting what it consumed) is the
//! primary deletion path. This module covers the two cases that outlive a
//! job:
//!
//! * the retained first-page preview, deleted one retention window after
//!   delivery by a one-shot background timer;
//! * anything a crashed job left behind, collected by a recurring sweep
//!   that lists and deletes *every* object in the store.
//!
//! The sweep is deliberately blunt — the store is assumed to hold only
//! this system's transient artifacts — and runs concurrently with live
//! jobs (accepted single-tenant race). Both mechanisms are plain tokio
//! tasks returned as [`TaskHandle`]s: start them once at process startup,
//! stop them at shutdown, and drive them with the paused clock in tests.
//! All deletions here are best-effort; failures are logged and never
//! escalated.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::ObjectStore;

/// Owns the store handle the background tasks delete through.
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn ObjectStore>,
}

/// A running background task. Aborting is the only interaction — these
/// tasks have no result to join.
#[derive(Debug)]
pub struct TaskHandle {
    inner: JoinHandle<()>,
}

impl TaskHandle {
    /// Stop the task. Safe to call on an already-finished task.
    pub fn stop(&self) {
        self.inner.abort();
    }

    /// True once the task has run to completion or been stopped.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Lifecycle {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Schedule deletion of `key` after `delay`.
    ///
    /// Fire-and-forget: once scheduled, the deletion happens unless the
    /// process exits (or the handle is stopped at shutdown) first. The
    /// timer runs independently of the job that scheduled it.
    pub fn schedule_deletion(&self, key: impl Into<String>, delay: Duration) -> TaskHandle {
        let key = key.into();
        let store = Arc::clone(&self.store);
        debug!("deletion of '{}' scheduled in {:?}", key, delay);
        let inner = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match store.delete(&key).await {
                Ok(()) => info!("retention window elapsed, deleted '{}'", key),
                Err(e) => warn!("deferred deletion of '{}' failed: {e}", key),
            }
        });
        TaskHandle { inner }
    }

    /// Start the recurring full-store sweep.
    ///
    /// The first pass runs immediately, then once per `interval`, forever
    /// until the handle is stopped. Call once at process startup.
    pub fn start_sweep(&self, interval: Duration) -> TaskHandle {
        let store = Arc::clone(&self.store);
        info!("store sweep started, interval {:?}", interval);
        let inner = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately, so the first sweep
                // runs at startup like every later one runs on schedule.
                ticker.tick().await;
                sweep_once(store.as_ref()).await;
            }
        });
        TaskHandle { inner }
    }
}

/// List and delete every object currently in the store.
async fn sweep_once(store: &dyn ObjectStore) {
    let keys = match store.list_all().await {
        Ok(keys) => keys,
        Err(e) => {
            warn!("sweep could not list store: {e}");
            return;
        }
    };
    if keys.is_empty() {
        debug!("sweep found nothing to delete");
        return;
    }
    let total = keys.len();
    let mut deleted = 0usize;
    for key in keys {
        match store.delete(&key).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!("sweep failed to delete '{}': {e}", key),
        }
    }
    info!("sweep deleted {deleted}/{total} objects");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn deferred_deletion_fires_after_delay() {
        let store = Arc::new(MemoryStore::new());
        store.put("preview.png", vec![1]).await.unwrap();
        let lifecycle = Lifecycle::new(Arc::clone(&store) as Arc<dyn ObjectStore>);

        let handle =
            lifecycle.schedule_deletion("preview.png", Duration::from_secs(3600));

        // Just before the window closes the object must still be there.
        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert!(store.get("preview.png").await.is_ok());

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(store.get("preview.png").await.is_err());
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn deletion_of_missing_key_is_quiet() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(store as Arc<dyn ObjectStore>);
        let handle = lifecycle.schedule_deletion("ghost", Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_clears_store_immediately_and_recurs() {
        let store = Arc::new(MemoryStore::new());
        store.put("a", vec![0]).await.unwrap();
        store.put("b", vec![0]).await.unwrap();
        let lifecycle = Lifecycle::new(Arc::clone(&store) as Arc<dyn ObjectStore>);

        let handle = lifecycle.start_sweep(Duration::from_secs(3600));

        // First pass is immediate.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_empty(), "first sweep should run at startup");

        // New garbage appears; the next tick collects it.
        store.put("leak", vec![0]).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3601)).await;
        tokio::task::yield_now().await;
        assert!(store.is_empty(), "second sweep should collect the leak");
        assert!(!handle.is_finished(), "sweep runs forever until stopped");

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_sweep_no_longer_deletes() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(Arc::clone(&store) as Arc<dyn ObjectStore>);
        let handle = lifecycle.start_sweep(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        tokio::task::yield_now().await;

        store.put("survivor", vec![0]).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        tokio::task::yield_now().await;
        assert!(store.get("survivor").await.is_ok());
    }
}
