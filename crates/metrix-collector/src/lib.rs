//! Metric collection for the metrix agent.
//!
//! Each [`Collector`] samples one family of signals (this process, the host,
//! the poll loop itself) and returns them as [`MetricRecord`]s. The
//! [`Harvester`] runs every collector on a fixed interval and feeds the
//! results into the agent's [`CollectionStore`](metrix_common::CollectionStore).

pub mod harvester;
pub mod poll;
pub mod process;
pub mod system;

use anyhow::Result;
use metrix_common::MetricRecord;

pub use harvester::Harvester;

/// A metric source sampled by the agent on every poll.
///
/// Gauges must be finite and non-negative; counters carry the increment
/// since the previous call.
pub trait Collector: Send + Sync {
    /// Returns the collector name (e.g., `"process"`, `"system"`), used for logging.
    fn name(&self) -> &str;

    /// Samples current values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn collect(&mut self) -> Result<Vec<MetricRecord>>;
}

/// The standard collector set: process, system and poll collectors.
pub fn default_collectors() -> Result<Vec<Box<dyn Collector>>> {
    Ok(vec![
        Box::new(process::ProcessCollector::new()?),
        Box::new(system::SystemCollector::new()),
        Box::new(poll::PollCollector::new()),
    ])
}
