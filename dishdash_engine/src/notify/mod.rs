//! Outbound delivery of email and SMS notifications.
//!
//! Push notifications never leave the process: they are published to the user's room on the status bus.
mod http_relay;
mod log_transport;

use async_trait::async_trait;
pub use http_relay::HttpRelayTransport;
pub use log_transport::LogTransport;
use thiserror::Error;

use crate::db_types::NotificationChannel;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("{0} notifications are not supported by this transport")]
    UnsupportedChannel(NotificationChannel),
    #[error("The notification relay could not be reached: {0}")]
    Unreachable(String),
    #[error("The notification relay refused the message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Sends `content` to `recipient`, which is an email address or phone number depending on the channel.
    async fn send(&self, channel: NotificationChannel, recipient: &str, content: &str) -> Result<(), TransportError>;
}
