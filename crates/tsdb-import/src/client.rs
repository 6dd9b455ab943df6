//! HTTP client for the time-series ingestion endpoint
//!
//! One POST per batch, no retries. A batch counts as delivered only when the
//! endpoint answers `200 OK`; anything else is logged with the payload and dropped.

use crate::error::{ImportError, Result};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

/// Delivers rendered batches to the configured endpoint
#[derive(Debug, Clone)]
pub struct IngestClient {
    client: Client,
    endpoint: Url,
}

impl IngestClient {
    pub fn new(endpoint: Url) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tsdb-import/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST `payload` as `application/json`.
    ///
    /// Failures are logged here together with the payload; callers only count them.
    pub async fn deliver(&self, payload: &[u8]) -> Result<()> {
        match self.post(payload).await {
            Ok(()) => {
                debug!(endpoint = %self.endpoint, bytes = payload.len(), "batch delivered");
                Ok(())
            },
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    "failed to post metrics, dropping batch"
                );
                warn!("Metrics:\n{}", String::from_utf8_lossy(payload));
                Err(e)
            },
        }
    }

    async fn post(&self, payload: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ImportError::Rejected(status)),
        }
    }
}
