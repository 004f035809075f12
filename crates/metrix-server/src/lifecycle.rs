use anyhow::{Context, Result};
use metrix_common::CollectionStore;
use metrix_storage::SnapshotStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Loads the last snapshot into `store`. Returns the number of records loaded.
///
/// Must finish before the listener is bound so no write races the load. A
/// snapshot that cannot be read or holds invalid records is an error; the
/// store is left empty in that case.
pub async fn restore_store(
    store: &CollectionStore,
    backend: Option<&Arc<dyn SnapshotStore>>,
    restore: bool,
) -> Result<usize> {
    let Some(backend) = backend else {
        tracing::info!("No persistence configured, metrics live in memory only");
        return Ok(0);
    };
    if !restore {
        tracing::info!(backend = backend.name(), "Restore disabled, starting with an empty store");
        return Ok(0);
    }

    let records = backend
        .restore()
        .await
        .with_context(|| format!("failed to read snapshot from {} backend", backend.name()))?;
    let loaded = store
        .restore(records)
        .context("snapshot holds invalid records")?;
    tracing::info!(backend = backend.name(), count = loaded, "Restored metrics snapshot");
    Ok(loaded)
}

/// Stops the snapshot scheduler, then saves the store once more.
///
/// The final save runs even if the scheduler task panicked. Returns the
/// number of records written, 0 without a backend.
pub async fn shutdown(
    store: &CollectionStore,
    backend: Option<&Arc<dyn SnapshotStore>>,
    cancel: &CancellationToken,
    scheduler: Option<JoinHandle<()>>,
) -> metrix_storage::Result<usize> {
    cancel.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Snapshot scheduler ended abnormally");
        }
    }

    let Some(backend) = backend else {
        return Ok(0);
    };
    let records = store.snapshot();
    backend.save(&records).await?;
    tracing::info!(backend = backend.name(), count = records.len(), "Final snapshot saved");
    Ok(records.len())
}
