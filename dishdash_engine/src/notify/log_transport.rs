use async_trait::async_trait;
use log::*;

use crate::{
    db_types::NotificationChannel,
    notify::{NotificationTransport, TransportError},
};

/// Writes every message to the log instead of sending it. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, channel: NotificationChannel, recipient: &str, content: &str) -> Result<(), TransportError> {
        info!("📣️ [{channel}] to {recipient}: {content}");
        Ok(())
    }
}
