use chrono::{DateTime, Utc};
use metrix_common::CollectionStore;
use metrix_storage::SnapshotStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CollectionStore>,
    /// Active persistence backend, if one is configured. Used by `/ping`.
    pub persistence: Option<Arc<dyn SnapshotStore>>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<CollectionStore>, persistence: Option<Arc<dyn SnapshotStore>>) -> Self {
        Self {
            store,
            persistence,
            start_time: Utc::now(),
        }
    }
}
