//! Upstream notification delivery
//!
//! Routes each health record to the north-bound notifications API, which then
//! knows how to log it or relay it to the alerting bot:
//! - `POST {base}/{device}/notifications?type=vitals` with a JSON body
//! - 5 second ceiling per call
//! - No retry: the caller logs the failure and moves on

#[cfg(test)]
pub mod mock;

use crate::metrics::HealthRecord;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Per-call timeout for notification delivery
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery failure for a single record
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Device offline or server unreachable
    #[error("notification server not reachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected server response {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("failed to encode notification: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for health records
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, record: &HealthRecord) -> Result<(), NotifyError>;
}

/// HTTP client for the notifications API
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::with_timeout(base_url, NOTIFY_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Notifications URL for a device
    pub fn endpoint(&self, device_identifier: &str) -> String {
        format!("{}/{}/notifications?type=vitals", self.base_url, device_identifier)
    }
}

#[async_trait]
impl NotificationSink for HttpNotifier {
    async fn send(&self, record: &HealthRecord) -> Result<(), NotifyError> {
        let url = self.endpoint(record.device_identifier());
        let body = serde_json::to_vec(record)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(NotifyError::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Notification delivered to {}", url);
        Ok(())
    }
}
