//! Periodic purge of old jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::store::JobStore;

/// Runs [`JobStore::cleanup_old_jobs`] on a fixed interval until shut down.
pub struct Sweeper {
    store: Arc<JobStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<JobStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Loop until `shutdown` fires. The first sweep happens one interval
    /// after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::info!(interval = ?self.interval, "Job sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = self.store.cleanup_old_jobs().await;
                    tracing::debug!(purged, remaining = self.store.len(), "Job sweep finished");
                }
            }
        }

        tracing::info!("Job sweeper stopped");
    }
}
