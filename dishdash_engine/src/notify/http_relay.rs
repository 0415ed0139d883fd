use std::time::Duration;

use async_trait::async_trait;
use log::*;
use serde::Serialize;

use crate::{
    db_types::NotificationChannel,
    notify::{NotificationTransport, TransportError},
};

/// Hands email and SMS messages to an HTTP relay, which forwards them to the actual providers.
///
/// Messages are POSTed as JSON to `{base_url}/{channel}`.
#[derive(Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    content: &'a str,
}

impl HttpRelayTransport {
    pub fn new<S: Into<String>>(base_url: S, timeout: Duration) -> Result<Self, TransportError> {
        let client =
            reqwest::Client::builder().timeout(timeout).build().map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl NotificationTransport for HttpRelayTransport {
    async fn send(&self, channel: NotificationChannel, recipient: &str, content: &str) -> Result<(), TransportError> {
        if channel == NotificationChannel::Push {
            return Err(TransportError::UnsupportedChannel(channel));
        }
        let url = format!("{}/{channel}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RelayMessage { to: recipient, content })
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            trace!("📣️ Relay accepted {channel} message for {recipient}");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Rejected(format!("{status}: {body}")))
        }
    }
}
