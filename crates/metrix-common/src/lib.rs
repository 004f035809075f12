//! Types shared by the metrix agent and server.
//!
//! [`types::MetricRecord`] is the unit of telemetry, [`collection::CollectionStore`]
//! holds the current value of every known metric for one process, and
//! [`retry`] provides the bounded backoff used at every I/O boundary.

pub mod collection;
pub mod error;
pub mod retry;
pub mod ticker;
pub mod types;

pub use collection::CollectionStore;
pub use error::CollectError;
pub use types::{MetricKind, MetricRecord, MetricValue, Metrics};
