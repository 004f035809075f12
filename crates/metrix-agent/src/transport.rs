use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

use crate::error::{Result, SendError};

/// Delivers one encoded metric to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `body` is a gzip-compressed JSON metric.
    async fn submit(&self, body: Vec<u8>) -> Result<()>;
}

/// POSTs to the server's JSON update endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, body: Vec<u8>) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .body(body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() {
            return Err(SendError::Server {
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SendError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}
