use crate::Collector;
use metrix_common::ticker::ticker;
use metrix_common::CollectionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Samples every collector on a fixed interval into the agent's store.
///
/// Each sample goes through [`CollectionStore::collect`], so `PollCount`
/// accumulates across polls and gauges always hold the latest reading.
pub struct Harvester {
    store: Arc<CollectionStore>,
    collectors: Vec<Box<dyn Collector>>,
}

impl Harvester {
    pub fn new(store: Arc<CollectionStore>, collectors: Vec<Box<dyn Collector>>) -> Self {
        Self { store, collectors }
    }

    /// Runs every collector once. A failing collector or a rejected sample is
    /// logged and skipped. Returns the number of samples stored.
    pub fn poll_once(&mut self) -> usize {
        let mut stored = 0;
        for collector in &mut self.collectors {
            let records = match collector.collect() {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(collector = collector.name(), error = %e, "Collection failed");
                    continue;
                }
            };
            for record in records {
                let id = record.id.clone();
                match self.store.collect(record) {
                    Ok(_) => stored += 1,
                    Err(e) => tracing::warn!(
                        collector = collector.name(),
                        metric = %id,
                        error = %e,
                        "Sample rejected"
                    ),
                }
            }
        }
        tracing::debug!(count = stored, "Collected metrics");
        stored
    }

    /// Polls immediately, then every `every`, until `cancel` fires.
    pub async fn run(mut self, every: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = every.as_secs_f64(),
            collectors = self.collectors.len(),
            "Harvester started"
        );
        let mut tick = ticker(every, true);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            self.poll_once();
        }
        tracing::info!("Harvester stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollCollector;
    use anyhow::{bail, Result};
    use metrix_common::{MetricRecord, MetricValue};

    struct Failing;

    impl Collector for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn collect(&mut self) -> Result<Vec<MetricRecord>> {
            bail!("sensor unavailable")
        }
    }

    struct Fixed(Vec<MetricRecord>);

    impl Collector for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn collect(&mut self) -> Result<Vec<MetricRecord>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn poll_count_accumulates_across_polls() {
        let store = Arc::new(CollectionStore::new());
        let mut harvester = Harvester::new(store.clone(), vec![Box::new(PollCollector::new())]);
        harvester.poll_once();
        harvester.poll_once();
        harvester.poll_once();
        assert_eq!(store.get("PollCount").unwrap().value, MetricValue::Counter(3));
        assert!(store.get("RandomValue").is_ok());
    }

    #[test]
    fn failing_collector_does_not_block_others() {
        let store = Arc::new(CollectionStore::new());
        let mut harvester = Harvester::new(
            store.clone(),
            vec![
                Box::new(Failing),
                Box::new(Fixed(vec![
                    MetricRecord::gauge("Good", 1.0),
                    MetricRecord::gauge("Bad", -1.0),
                ])),
            ],
        );
        assert_eq!(harvester.poll_once(), 1);
        assert_eq!(store.list_ids(), vec!["Good"]);
    }

    #[tokio::test]
    async fn run_polls_until_cancelled() {
        let store = Arc::new(CollectionStore::new());
        let harvester = Harvester::new(store.clone(), vec![Box::new(PollCollector::new())]);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(harvester.run(Duration::from_millis(10), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let MetricValue::Counter(polls) = store.get("PollCount").unwrap().value else {
            panic!("PollCount should be a counter");
        };
        assert!(polls >= 2, "expected several polls, got {polls}");
        let after = store.get("PollCount").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("PollCount").unwrap(), after);
    }
}
