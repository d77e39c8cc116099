//! Periodic path-map refresh.
//!
//! One background task re-reads the path map every interval. It never holds
//! the snapshot lock across the remote read, so requests keep running against
//! the current snapshot while a refresh is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::index::PathIndex;

/// Handle on the background refresh task. Dropping it stops the task.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    period: Duration,
}

impl RefreshScheduler {
    /// Spawn the refresh loop on the current tokio runtime.
    ///
    /// The first refresh runs one `period` after spawning.
    pub fn spawn(index: Arc<PathIndex>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));

        let token = cancel.clone();
        let counter = ticks.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_ms = period.as_millis() as u64, "refresh scheduler started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        // Failures are logged by the index; the next tick retries.
                        let _ = index.refresh().await;
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            tracing::debug!("refresh scheduler stopped");
        });

        Self {
            cancel,
            handle: Some(handle),
            ticks,
            period,
        }
    }

    /// Number of refresh attempts made so far, successful or not.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "refresh task did not exit cleanly");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StoreClient;
    use crdtfs_store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_the_period() {
        let store = Arc::new(MemoryStore::new());
        let index = Arc::new(PathIndex::new(StoreClient::new(store.clone(), "t", None)));
        let scheduler = RefreshScheduler::spawn(index.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.ticks(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(scheduler.ticks(), 3);
        assert_eq!(index.stats().refreshes, 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let store = Arc::new(MemoryStore::new());
        store.set_reachable(false);
        let index = Arc::new(PathIndex::new(StoreClient::new(store.clone(), "t", None)));
        let scheduler = RefreshScheduler::spawn(index.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(index.stats().failures, 2);
        assert!(scheduler.is_running());

        store.set_reachable(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(index.stats().refreshes, 1);

        scheduler.shutdown().await;
    }
}
