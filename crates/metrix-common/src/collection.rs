use crate::error::{CollectError, Result};
use crate::types::{MetricRecord, MetricValue};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Records in first-write order plus an id index into `records`.
#[derive(Default)]
struct Inner {
    records: Vec<MetricRecord>,
    index: HashMap<String, usize>,
}

impl Inner {
    fn get(&self, id: &str) -> Option<&MetricRecord> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    fn upsert(&mut self, record: MetricRecord) {
        match self.index.get(&record.id) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }
}

/// Applies `incoming` on top of `current` with kind-specific semantics.
///
/// Counters add the incoming delta to the stored one; gauges are replaced.
fn merge(current: Option<&MetricRecord>, incoming: MetricRecord) -> Result<MetricRecord> {
    incoming.validate()?;
    let Some(current) = current else {
        return Ok(incoming);
    };
    match (current.value, incoming.value) {
        (MetricValue::Counter(old), MetricValue::Counter(delta)) => {
            let total = old.checked_add(delta).ok_or_else(|| {
                CollectError::InvalidArgument(format!(
                    "counter '{}' would overflow ({old} + {delta})",
                    incoming.id
                ))
            })?;
            Ok(MetricRecord::counter(incoming.id, total))
        }
        (MetricValue::Gauge(_), MetricValue::Gauge(_)) => Ok(incoming),
        (stored, _) => Err(CollectError::KindMismatch {
            id: incoming.id.clone(),
            stored: stored.kind(),
            incoming: incoming.kind(),
        }),
    }
}

/// The authoritative current value of every metric known to one process.
///
/// All access goes through one internal mutex; no method performs I/O or
/// holds the lock across an await point, so the store can be shared as
/// `Arc<CollectionStore>` between request handlers and periodic loops.
///
/// # Examples
///
/// ```
/// use metrix_common::{CollectionStore, MetricRecord, MetricValue};
///
/// let store = CollectionStore::new();
/// store.collect(MetricRecord::counter("hits", 5)).unwrap();
/// store.collect(MetricRecord::counter("hits", 3)).unwrap();
/// assert_eq!(store.get("hits").unwrap().value, MetricValue::Counter(8));
/// ```
#[derive(Default)]
pub struct CollectionStore {
    inner: Mutex<Inner>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validates and applies one write, returning the stored record after the merge.
    ///
    /// # Errors
    ///
    /// [`CollectError::InvalidArgument`] for invalid values or counter overflow,
    /// [`CollectError::KindMismatch`] when the id is already stored with the
    /// other kind. The store is unchanged on error.
    pub fn collect(&self, record: MetricRecord) -> Result<MetricRecord> {
        let mut inner = self.lock();
        let merged = merge(inner.get(&record.id), record)?;
        inner.upsert(merged.clone());
        Ok(merged)
    }

    /// Applies a batch of writes atomically: either every record is merged or none is.
    ///
    /// Returns the post-merge record for each input, in input order. A batch
    /// may mention the same id several times; later items merge onto earlier ones.
    pub fn collect_batch(&self, records: Vec<MetricRecord>) -> Result<Vec<MetricRecord>> {
        let mut inner = self.lock();
        let mut staged: HashMap<String, MetricRecord> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let current = staged.get(&record.id).or_else(|| inner.get(&record.id));
            let merged = merge(current, record)?;
            if !staged.contains_key(&merged.id) {
                order.push(merged.id.clone());
            }
            staged.insert(merged.id.clone(), merged.clone());
            results.push(merged);
        }

        for id in order {
            if let Some(record) = staged.remove(&id) {
                inner.upsert(record);
            }
        }
        Ok(results)
    }

    pub fn get(&self, id: &str) -> Result<MetricRecord> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| CollectError::NotFound(id.to_string()))
    }

    /// Returns the canonical JSON wire form of the stored record.
    pub fn get_serialized(&self, id: &str) -> Result<Vec<u8>> {
        let record = self.get(id)?;
        Ok(serde_json::to_vec(&record)?)
    }

    /// All known ids in first-write order.
    pub fn list_ids(&self) -> Vec<String> {
        self.lock().records.iter().map(|r| r.id.clone()).collect()
    }

    /// Inserts or replaces `record` without validation or merging.
    ///
    /// Callers must have validated the record already; public writes go
    /// through [`collect`](Self::collect).
    pub fn upsert(&self, record: MetricRecord) {
        self.lock().upsert(record);
    }

    /// Point-in-time copy of every record, in first-write order.
    pub fn snapshot(&self) -> Vec<MetricRecord> {
        self.lock().records.clone()
    }

    /// Loads a persisted snapshot. Each record is validated, then replaces any
    /// record with the same id. Returns the number of records loaded.
    ///
    /// Nothing is loaded if any record is invalid.
    pub fn restore(&self, records: Vec<MetricRecord>) -> Result<usize> {
        for record in &records {
            record.validate()?;
        }
        let count = records.len();
        let mut inner = self.lock();
        for record in records {
            inner.upsert(record);
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricKind;
    use std::sync::Arc;

    #[test]
    fn counter_updates_accumulate() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::counter("hits", 5)).unwrap();
        let merged = store.collect(MetricRecord::counter("hits", 3)).unwrap();
        assert_eq!(merged.value, MetricValue::Counter(8));
        assert_eq!(store.get("hits").unwrap().value, MetricValue::Counter(8));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn gauge_updates_overwrite() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::gauge("temp", 12.5)).unwrap();
        store.collect(MetricRecord::gauge("temp", 3.25)).unwrap();
        assert_eq!(store.get("temp").unwrap().value, MetricValue::Gauge(3.25));
    }

    #[test]
    fn negative_gauge_leaves_previous_value() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::gauge("temp", 12.5)).unwrap();
        let err = store.collect(MetricRecord::gauge("temp", -1.0)).unwrap_err();
        assert!(matches!(err, CollectError::InvalidArgument(_)));
        assert_eq!(store.get("temp").unwrap().value, MetricValue::Gauge(12.5));
    }

    #[test]
    fn negative_counter_creates_nothing() {
        let store = CollectionStore::new();
        let err = store.collect(MetricRecord::counter("fresh", -4)).unwrap_err();
        assert!(matches!(err, CollectError::InvalidArgument(_)));
        assert!(store.is_empty());
        assert!(matches!(store.get("fresh"), Err(CollectError::NotFound(_))));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::counter("mixed", 1)).unwrap();
        let err = store.collect(MetricRecord::gauge("mixed", 2.0)).unwrap_err();
        match err {
            CollectError::KindMismatch { stored, incoming, .. } => {
                assert_eq!(stored, MetricKind::Counter);
                assert_eq!(incoming, MetricKind::Gauge);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get("mixed").unwrap().value, MetricValue::Counter(1));
    }

    #[test]
    fn counter_overflow_is_rejected() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::counter("big", i64::MAX)).unwrap();
        assert!(store.collect(MetricRecord::counter("big", 1)).is_err());
        assert_eq!(store.get("big").unwrap().value, MetricValue::Counter(i64::MAX));
    }

    #[test]
    fn ids_keep_first_write_order() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::gauge("b", 1.0)).unwrap();
        store.collect(MetricRecord::counter("a", 1)).unwrap();
        store.collect(MetricRecord::gauge("b", 2.0)).unwrap();
        store.collect(MetricRecord::gauge("c", 3.0)).unwrap();
        assert_eq!(store.list_ids(), vec!["b", "a", "c"]);
    }

    #[test]
    fn serialized_form_is_wire_json() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::counter("PollCount", 2)).unwrap();
        let bytes = store.get_serialized("PollCount").unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"id":"PollCount","type":"counter","delta":2}"#
        );
        assert!(matches!(
            store.get_serialized("missing"),
            Err(CollectError::NotFound(_))
        ));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let store = CollectionStore::new();
        store.collect(MetricRecord::counter("hits", 1)).unwrap();

        let err = store
            .collect_batch(vec![
                MetricRecord::counter("hits", 10),
                MetricRecord::gauge("new", 1.0),
                MetricRecord::gauge("bad", -1.0),
            ])
            .unwrap_err();
        assert!(matches!(err, CollectError::InvalidArgument(_)));
        assert_eq!(store.get("hits").unwrap().value, MetricValue::Counter(1));
        assert!(store.get("new").is_err());

        let merged = store
            .collect_batch(vec![
                MetricRecord::counter("hits", 2),
                MetricRecord::counter("hits", 3),
                MetricRecord::gauge("new", 1.5),
            ])
            .unwrap();
        assert_eq!(merged[0].value, MetricValue::Counter(3));
        assert_eq!(merged[1].value, MetricValue::Counter(6));
        assert_eq!(store.get("hits").unwrap().value, MetricValue::Counter(6));
        assert_eq!(store.list_ids(), vec!["hits", "new"]);
    }

    #[test]
    fn restore_rejects_invalid_snapshot_wholesale() {
        let store = CollectionStore::new();
        let err = store
            .restore(vec![
                MetricRecord::gauge("ok", 1.0),
                MetricRecord::counter("broken", -1),
            ])
            .unwrap_err();
        assert!(matches!(err, CollectError::InvalidArgument(_)));
        assert!(store.is_empty());

        let loaded = store
            .restore(vec![MetricRecord::gauge("ok", 1.0), MetricRecord::counter("n", 4)])
            .unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn concurrent_counter_writes_are_not_lost() {
        let store = Arc::new(CollectionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store.collect(MetricRecord::counter("shared", 1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get("shared").unwrap().value, MetricValue::Counter(2000));
    }
}
