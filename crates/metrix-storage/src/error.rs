use sea_orm::DbErr;
use std::path::PathBuf;

/// Errors raised at the persistence boundary.
///
/// Whether an error is worth retrying is decided by [`PersistError::is_transient`];
/// the database backend has already retried transient failures by the time
/// one reaches the caller.
///
/// # Examples
///
/// ```rust
/// use metrix_storage::error::PersistError;
///
/// let err = PersistError::CorruptRow {
///     id: "PollCount".to_string(),
///     reason: "counter without delta".to_string(),
/// };
/// assert!(err.to_string().contains("PollCount"));
/// assert!(!err.is_transient());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Every attempt of a database call failed with a connection-class error.
    #[error("Persist: database unavailable after {attempts} attempts: {source}")]
    TransientExhausted { attempts: u32, source: DbErr },

    /// A database error that retrying cannot fix (bad DSN, syntax, constraint).
    #[error("Persist: database error: {0}")]
    Database(#[from] DbErr),

    #[error("Persist: snapshot file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot file is not a JSON array of valid records.
    #[error("Persist: snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row does not describe a valid counter or gauge.
    #[error("Persist: stored row '{id}' is corrupt: {reason}")]
    CorruptRow { id: String, reason: String },
}

impl PersistError {
    /// True for connection-class failures that may succeed on a later tick.
    pub fn is_transient(&self) -> bool {
        match self {
            PersistError::TransientExhausted { .. } => true,
            PersistError::Database(err) => crate::database::is_transient(err),
            _ => false,
        }
    }
}

/// Convenience `Result` alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
