//! Job notification infrastructure.
//!
//! - [`Notifier`]: the delivery seam pollers and runners push through.
//! - [`JobNotification`]: the user-facing message envelope.
//! - [`NotificationBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`delivery`]: external delivery channels (webhook).

pub mod bus;
pub mod delivery;
pub mod notifier;

pub use bus::{JobNotification, NotificationBus};
pub use delivery::webhook::WebhookDelivery;
pub use notifier::{AddressedNotifier, DeliveryError, Notifier};
