/// Outcome of a failed metric submission.
///
/// Transport failures and 5xx responses are retried; a 4xx response means
/// the server will never accept this payload and is final.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Connection refused, reset, timed out, or any other transport failure.
    #[error("Send: transport error: {0}")]
    Transport(String),

    #[error("Send: server error (status {status})")]
    Server { status: u16 },

    #[error("Send: rejected by server (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Send: JSON encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Send: gzip compression failed: {0}")]
    Compress(#[from] std::io::Error),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Transport(_) | SendError::Server { .. })
    }
}

pub type Result<T> = std::result::Result<T, SendError>;
