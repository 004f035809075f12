use flate2::write::GzEncoder;
use flate2::Compression;
use metrix_common::retry::{retry_with_backoff, RetryFailure, RetryPolicy};
use metrix_common::ticker::ticker;
use metrix_common::{CollectionStore, MetricRecord};
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SendError};
use crate::transport::Transport;

/// Serializes a record to its wire JSON and gzips it.
pub fn encode(record: &MetricRecord) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(record)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Submits one encoded metric, retrying transport failures and 5xx responses.
pub async fn submit_with_retry(
    transport: &dyn Transport,
    policy: &RetryPolicy,
    body: Vec<u8>,
) -> std::result::Result<(), RetryFailure<SendError>> {
    let body = &body;
    retry_with_backoff(policy, "submit metric", SendError::is_retryable, move || {
        transport.submit(body.clone())
    })
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    /// Submissions started this tick.
    pub submitted: usize,
    /// Metrics that found no free slot and wait for the next tick.
    pub deferred: usize,
}

/// Reports every record of the agent's store to the server on each tick.
///
/// At most `rate_limit` submissions are in flight at once. A metric that
/// finds every slot taken is not queued; it is skipped for this tick and
/// tried first on the next one, so a store larger than the limit still
/// gets fully delivered over successive ticks.
pub struct Sender {
    store: Arc<CollectionStore>,
    transport: Arc<dyn Transport>,
    slots: Arc<Semaphore>,
    rate_limit: usize,
    policy: RetryPolicy,
    in_flight: JoinSet<()>,
    deferred: Vec<String>,
}

impl Sender {
    pub fn new(
        store: Arc<CollectionStore>,
        transport: Arc<dyn Transport>,
        rate_limit: usize,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            slots: Arc::new(Semaphore::new(rate_limit)),
            rate_limit,
            policy,
            in_flight: JoinSet::new(),
            deferred: Vec::new(),
        }
    }

    /// Starts one report cycle without waiting for its submissions.
    ///
    /// Must be called from within a tokio runtime.
    pub fn report_once(&mut self) -> ReportSummary {
        self.reap_finished();

        let mut records = self.store.snapshot();
        if !self.deferred.is_empty() {
            let first: HashSet<&str> = self.deferred.iter().map(String::as_str).collect();
            let (mut front, rest): (Vec<_>, Vec<_>) = records
                .into_iter()
                .partition(|r| first.contains(r.id.as_str()));
            let rank = |id: &str| self.deferred.iter().position(|d| d == id);
            front.sort_by_key(|r| rank(&r.id));
            front.extend(rest);
            records = front;
        }

        let mut submitted = 0;
        let mut deferred = Vec::new();
        for record in records {
            let Ok(permit) = self.slots.clone().try_acquire_owned() else {
                deferred.push(record.id);
                continue;
            };
            let body = match encode(&record) {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(metric = %record.id, error = %e, "Failed to encode metric");
                    continue;
                }
            };

            let transport = self.transport.clone();
            let policy = self.policy.clone();
            let id = record.id;
            self.in_flight.spawn(async move {
                let _permit = permit;
                match submit_with_retry(transport.as_ref(), &policy, body).await {
                    Ok(()) => tracing::debug!(metric = %id, "Metric reported"),
                    Err(failure) => tracing::error!(
                        metric = %id,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Failed to report metric"
                    ),
                }
            });
            submitted += 1;
        }

        if !deferred.is_empty() {
            tracing::warn!(
                deferred = deferred.len(),
                rate_limit = self.rate_limit,
                "Rate limit is exceeded, deferring metrics to next report"
            );
        }
        self.deferred = deferred;
        ReportSummary {
            submitted,
            deferred: self.deferred.len(),
        }
    }

    /// Ids skipped on the last tick, in the order they will be retried.
    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.in_flight.try_join_next() {
            if let Err(e) = result {
                tracing::error!(error = %e, "Submission task failed");
            }
        }
    }

    /// Waits for every in-flight submission to finish.
    pub async fn drain(&mut self) {
        while let Some(result) = self.in_flight.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Submission task failed");
            }
        }
    }

    /// Reports every `every` until `cancel` fires, then waits for in-flight
    /// submissions. The first report happens one interval after start.
    pub async fn run(mut self, every: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = every.as_secs_f64(),
            rate_limit = self.rate_limit,
            "Sender started"
        );
        let mut tick = ticker(every, false);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            let summary = self.report_once();
            tracing::debug!(
                submitted = summary.submitted,
                deferred = summary.deferred,
                deferred_ids = ?self.deferred(),
                "Report cycle started"
            );
        }
        tracing::info!(
            in_flight = self.in_flight.len(),
            "Sender stopping, waiting for in-flight submissions"
        );
        self.drain().await;
        tracing::info!("Sender stopped");
    }
}
