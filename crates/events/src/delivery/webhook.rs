//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] sends a JSON-encoded [`JobNotification`] to a chat
//! bridge via HTTP POST. Failed attempts are retried with exponential
//! backoff (1 s, 2 s, 4 s by default).

use std::time::Duration;

use async_trait::async_trait;

use crate::bus::JobNotification;
use crate::notifier::{DeliveryError, Notifier};

/// Default retry delays (exponential backoff: 1s, 2s, 4s).
const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers job notifications to one external webhook endpoint.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service targeting `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
        })
    }

    /// Override the backoff schedule. One extra attempt is made after the
    /// last delay.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a notification with retry.
    ///
    /// Returns `Ok(())` on the first successful attempt.
    pub async fn deliver(&self, notification: &JobNotification) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "kind": notification.kind,
            "job_id": notification.job_id,
            "recipient": notification.recipient,
            "text": notification.text,
            "payload": notification.payload,
            "timestamp": notification.timestamp,
        });

        let mut last_err: Option<DeliveryError> = None;

        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        url = %self.url,
                        error = %e,
                        "Notification delivery attempt failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        match self.try_send(&payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(url = %self.url, error = %e, "Notification delivery failed after all retries");
                Err(last_err.unwrap_or(e))
            }
        }
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(&self, payload: &serde_json::Value) -> Result<(), DeliveryError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookDelivery {
    async fn notify(&self, notification: JobNotification) -> Result<(), DeliveryError> {
        self.deliver(&notification).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
