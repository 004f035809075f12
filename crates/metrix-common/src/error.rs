use crate::types::MetricKind;

/// Errors returned by metric validation and the [`CollectionStore`](crate::CollectionStore).
///
/// None of these are retried: they describe the request, not the environment.
///
/// # Examples
///
/// ```rust
/// use metrix_common::error::CollectError;
///
/// let err = CollectError::NotFound("PollCount".to_string());
/// assert!(err.to_string().contains("PollCount"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Malformed value: negative number, non-finite gauge, empty id, missing or
    /// conflicting payload field, counter overflow.
    #[error("Collect: invalid argument: {0}")]
    InvalidArgument(String),

    /// Metric type outside {counter, gauge}.
    #[error("Collect: unsupported metric type '{0}'")]
    UnsupportedKind(String),

    /// Lookup of an id the store has never seen.
    #[error("Collect: metric '{0}' not found")]
    NotFound(String),

    /// A write for an existing id carries a different kind than the stored record.
    #[error("Collect: metric '{id}' is a {stored}, refusing {incoming} update")]
    KindMismatch {
        id: String,
        stored: MetricKind,
        incoming: MetricKind,
    },

    /// The record could not be rendered to its wire form.
    #[error("Collect: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience `Result` alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;
