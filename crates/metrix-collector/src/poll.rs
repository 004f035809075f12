use crate::Collector;
use anyhow::Result;
use metrix_common::MetricRecord;

/// Emits `PollCount` (counter, +1 per poll) and `RandomValue` (gauge in `[0, 1)`).
///
/// `RandomValue` changes on every poll, so a receiver can tell fresh reports
/// from stale ones.
#[derive(Default)]
pub struct PollCollector;

impl PollCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Collector for PollCollector {
    fn name(&self) -> &str {
        "poll"
    }

    fn collect(&mut self) -> Result<Vec<MetricRecord>> {
        Ok(vec![
            MetricRecord::counter("PollCount", 1),
            MetricRecord::gauge("RandomValue", rand::random::<f64>()),
        ])
    }
}
