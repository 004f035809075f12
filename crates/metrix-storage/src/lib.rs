//! Durable snapshots of the metric [`CollectionStore`](metrix_common::CollectionStore).
//!
//! Two interchangeable backends implement [`SnapshotStore`]: a single-line
//! JSON file ([`file::FileBackend`]) and a SQL table reached through SeaORM
//! ([`database::DatabaseBackend`]). [`BackendChoice::select`] decides which
//! one a process uses; [`scheduler::SnapshotScheduler`] saves periodically.

pub mod database;
pub mod entities;
pub mod error;
pub mod file;
pub mod scheduler;


use async_trait::async_trait;
use metrix_common::MetricRecord;
use std::path::PathBuf;
use std::sync::Arc;

pub use database::{DatabaseBackend, DatabaseOptions};
pub use error::{PersistError, Result};
pub use file::FileBackend;
pub use scheduler::SnapshotScheduler;

/// Persistence port for full snapshots of the record set.
///
/// Implementations must be safe to share across tasks: the snapshot
/// scheduler, the shutdown path and the `/ping` handler all hold the same
/// `Arc<dyn SnapshotStore>`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Short backend name for logs (`"file"`, `"database"`).
    fn name(&self) -> &'static str;

    /// Reads the last durable snapshot. A missing snapshot is an empty set.
    async fn restore(&self) -> Result<Vec<MetricRecord>>;

    /// Replaces the durable snapshot with `records`.
    ///
    /// Interrupting a save never leaves a partially written snapshot visible
    /// to [`restore`](Self::restore).
    async fn save(&self, records: &[MetricRecord]) -> Result<()>;

    /// Cheap liveness check of the backing medium.
    async fn ping(&self) -> Result<()>;
}

/// Which backend a process should open, derived from its configuration.
///
/// # Examples
///
/// ```
/// use metrix_storage::BackendChoice;
///
/// let choice = BackendChoice::select(Some("/tmp/metrics.json"), Some("postgres://db/metrics"));
/// assert!(matches!(choice, BackendChoice::Database(_)));
///
/// let choice = BackendChoice::select(Some("/tmp/metrics.json"), Some(""));
/// assert!(matches!(choice, BackendChoice::File(_)));
///
/// assert!(matches!(BackendChoice::select(None, None), BackendChoice::None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    Database(String),
    File(PathBuf),
    None,
}

impl BackendChoice {
    /// The database wins when both destinations are configured. Empty strings
    /// count as unset.
    pub fn select(file_path: Option<&str>, dsn: Option<&str>) -> Self {
        let file_path = file_path.map(str::trim).filter(|p| !p.is_empty());
        let dsn = dsn.map(str::trim).filter(|d| !d.is_empty());
        match (file_path, dsn) {
            (_, Some(dsn)) => BackendChoice::Database(dsn.to_string()),
            (Some(path), None) => BackendChoice::File(PathBuf::from(path)),
            (None, None) => BackendChoice::None,
        }
    }
}

/// Opens the chosen backend, creating schema or directories as needed.
///
/// Returns `Ok(None)` for [`BackendChoice::None`]. Errors here are fatal to
/// startup.
pub async fn open_backend(
    choice: &BackendChoice,
    options: DatabaseOptions,
) -> Result<Option<Arc<dyn SnapshotStore>>> {
    let backend: Arc<dyn SnapshotStore> = match choice {
        BackendChoice::Database(dsn) => Arc::new(DatabaseBackend::connect(dsn, options).await?),
        BackendChoice::File(path) => Arc::new(FileBackend::new(path)?),
        BackendChoice::None => return Ok(None),
    };
    tracing::info!(backend = backend.name(), "Persistence backend ready");
    Ok(Some(backend))
}
