use metrix_common::ticker::ticker;
use metrix_common::CollectionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::SnapshotStore;

/// Periodically saves a point-in-time copy of the store through a backend.
///
/// The first save happens one full interval after start. A failed save is
/// logged and retried on the next tick; it never stops the loop.
pub struct SnapshotScheduler {
    store: Arc<CollectionStore>,
    backend: Arc<dyn SnapshotStore>,
    interval: Duration,
}

impl SnapshotScheduler {
    pub fn new(
        store: Arc<CollectionStore>,
        backend: Arc<dyn SnapshotStore>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            backend,
            interval,
        }
    }

    /// Spawns the loop unless persistence is off: no backend or a zero interval.
    pub fn spawn_if_enabled(
        store: Arc<CollectionStore>,
        backend: Option<Arc<dyn SnapshotStore>>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let backend = backend?;
        if interval.is_zero() {
            tracing::info!("Store interval is zero, periodic snapshots disabled");
            return None;
        }
        let scheduler = Self::new(store, backend, interval);
        Some(tokio::spawn(scheduler.run(cancel)))
    }

    /// Saves the current record set once. Returns the number of records written.
    pub async fn save_now(&self) -> Result<usize> {
        let records = self.store.snapshot();
        self.backend.save(&records).await?;
        Ok(records.len())
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            backend = self.backend.name(),
            interval_secs = self.interval.as_secs_f64(),
            "Snapshot scheduler started"
        );

        let mut tick = ticker(self.interval, false);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            match self.save_now().await {
                Ok(count) => tracing::debug!(count, "Snapshot saved"),
                Err(e) => tracing::error!(
                    error = %e,
                    transient = e.is_transient(),
                    "Snapshot save failed, retrying next tick"
                ),
            }
        }
        tracing::info!("Snapshot scheduler stopped");
    }
}
