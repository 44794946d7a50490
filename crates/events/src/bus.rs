//! In-process notification bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`NotificationBus`] fans [`JobNotification`]s out to any number of
//! subscribers (a chat adapter, a logger, tests). It is designed to be
//! shared via `Arc<NotificationBus>`.

use async_trait::async_trait;
use chrono::Utc;
use mjrelay_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::notifier::{DeliveryError, Notifier};

// ---------------------------------------------------------------------------
// JobNotification
// ---------------------------------------------------------------------------

/// A user-facing message about a job.
///
/// Constructed via [`JobNotification::new`] and enriched with the builder
/// methods [`with_job`](JobNotification::with_job),
/// [`with_recipient`](JobNotification::with_recipient), and
/// [`with_payload`](JobNotification::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNotification {
    /// Message type, one of the `MSG_TYPE_*` constants in
    /// `mjrelay_core::job_events`.
    pub kind: String,

    /// The job this message is about, if any.
    pub job_id: Option<JobId>,

    /// Opaque chat recipient (user or room id) understood by the delivery
    /// channel.
    pub recipient: Option<String>,

    /// Human-readable message text.
    pub text: String,

    /// Free-form JSON payload carrying structured data.
    pub payload: serde_json::Value,

    /// When the notification was created (UTC).
    pub timestamp: Timestamp,
}

impl JobNotification {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            job_id: None,
            recipient: None,
            text: text.into(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_job(mut self, job_id: impl Into<JobId>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out notification bus.
///
/// # Usage
///
/// ```rust
/// use mjrelay_events::bus::{JobNotification, NotificationBus};
///
/// let bus = NotificationBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobNotification::new("job_info", "hello"));
/// ```
pub struct NotificationBus {
    sender: broadcast::Sender<JobNotification>,
}

impl NotificationBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// If there are no active subscribers the notification is dropped.
    pub fn publish(&self, notification: JobNotification) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Notifier for NotificationBus {
    async fn notify(&self, notification: JobNotification) -> Result<(), DeliveryError> {
        self.publish(notification);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        let notification = JobNotification::new("job_progress", "Task ID: 42... progress 15%")
            .with_job("42")
            .with_recipient("room-1")
            .with_payload(serde_json::json!({"percent": 15}));

        bus.publish(notification);

        let received = rx.recv().await.expect("should receive the notification");
        assert_eq!(received.kind, "job_progress");
        assert_eq!(received.job_id.as_deref(), Some("42"));
        assert_eq!(received.recipient.as_deref(), Some("room-1"));
        assert_eq!(received.payload["percent"], 15);
    }

    #[tokio::test]
    async fn notify_goes_through_the_bus() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        bus.notify(JobNotification::new("job_info", "hi"))
            .await
            .expect("bus delivery never fails");

        assert_eq!(rx.recv().await.unwrap().text, "hi");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = NotificationBus::default();
        bus.publish(JobNotification::new("job_info", "orphan"));
    }

    #[test]
    fn default_notification_has_empty_optional_fields() {
        let n = JobNotification::new("job_info", "bare");
        assert!(n.job_id.is_none());
        assert!(n.recipient.is_none());
        assert!(n.payload.is_object());
    }
}
