//! The message-delivery seam used by pollers and runners.

use async_trait::async_trait;

use crate::bus::JobNotification;

/// Error type for notification delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// A sink that pushes job notifications to the end user.
///
/// Delivery failures are reported to the caller but are never fatal to job
/// tracking; callers log and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: JobNotification) -> Result<(), DeliveryError>;
}

/// Stamps a recipient onto notifications that do not name one, then
/// forwards them to the wrapped notifier.
pub struct AddressedNotifier<'a> {
    inner: &'a dyn Notifier,
    recipient: Option<String>,
}

impl<'a> AddressedNotifier<'a> {
    pub fn new(inner: &'a dyn Notifier, recipient: Option<String>) -> Self {
        Self { inner, recipient }
    }
}

#[async_trait]
impl Notifier for AddressedNotifier<'_> {
    async fn notify(&self, mut notification: JobNotification) -> Result<(), DeliveryError> {
        if notification.recipient.is_none() {
            notification.recipient = self.recipient.clone();
        }
        self.inner.notify(notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NotificationBus;

    #[tokio::test]
    async fn addressed_notifier_fills_missing_recipient_only() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();
        let addressed = AddressedNotifier::new(&bus, Some("room-7".into()));

        addressed
            .notify(JobNotification::new("job_info", "a"))
            .await
            .unwrap();
        addressed
            .notify(JobNotification::new("job_info", "b").with_recipient("room-1"))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().recipient.as_deref(), Some("room-7"));
        assert_eq!(rx.recv().await.unwrap().recipient.as_deref(), Some("room-1"));
    }
}
