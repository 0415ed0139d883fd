use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{NewNotification, Notification, NotificationChannel, NotificationStatus},
    notify::NotificationTransport,
    realtime::{BusEvent, Room, StatusBus},
    traits::{NotificationError, NotificationManagement, NotificationRecord, ProfileManagement},
};

/// Turns a notification request into a delivery attempt and records the outcome.
///
/// Email and SMS go out through the configured [`NotificationTransport`]. Push notifications are the `notification`
/// event on the user's room, which every recorded notification publishes regardless of channel.
pub struct NotificationApi<B> {
    db: B,
    transport: Arc<dyn NotificationTransport>,
    bus: StatusBus,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi")
    }
}

impl<B: Clone> Clone for NotificationApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), transport: Arc::clone(&self.transport), bus: self.bus.clone() }
    }
}

impl<B> NotificationApi<B> {
    pub fn new(db: B, transport: Arc<dyn NotificationTransport>, bus: StatusBus) -> Self {
        Self { db, transport, bus }
    }
}

impl<B> NotificationApi<B>
where B: NotificationManagement + ProfileManagement
{
    /// Attempts to deliver the notification and records the result.
    ///
    /// A failed delivery is not an error: the notification is recorded as `failed` and returned. If a notification
    /// with the same idempotency key has already been sent, it is returned as-is and nothing is sent again.
    pub async fn dispatch(&self, notification: NewNotification) -> Result<Notification, NotificationError> {
        if notification.user_id.trim().is_empty() {
            return Err(NotificationError::Validation("A recipient user id is required".into()));
        }
        if notification.content.trim().is_empty() {
            return Err(NotificationError::Validation("Notification content cannot be empty".into()));
        }
        let key = notification.idempotency_key.clone().unwrap_or_else(random_key);
        if let Some(existing) = self.db.notification_by_key(&key).await? {
            if existing.status == NotificationStatus::Sent {
                debug!("📣️ Notification {key} was already sent. Not sending it again.");
                return Ok(existing);
            }
        }
        let (status, error) = match self.deliver(&notification).await {
            Ok(()) => (NotificationStatus::Sent, None),
            Err(e) => {
                warn!("📣️ Could not send {} notification {key} to {}: {e}", notification.channel, notification.user_id);
                (NotificationStatus::Failed, Some(e))
            },
        };
        let record = NotificationRecord {
            user_id: notification.user_id,
            channel: notification.channel,
            content: notification.content,
            order_id: notification.order_id,
            idempotency_key: key,
            status,
            error,
        };
        let saved = self.db.record_notification(record).await?;
        let event = BusEvent::notification(saved.id, saved.content.clone(), saved.created_at);
        self.bus.publish(&Room::user(saved.user_id.clone()), event);
        trace!("📣️ Notification #{} recorded as {:?}", saved.id, saved.status);
        Ok(saved)
    }

    pub async fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>, NotificationError> {
        self.db.notifications_for_user(user_id).await
    }

    pub async fn mark_read(&self, notification_id: i64, user_id: &str) -> Result<Notification, NotificationError> {
        self.db.mark_read(notification_id, user_id).await?.ok_or(NotificationError::NotFound(notification_id))
    }

    async fn deliver(&self, notification: &NewNotification) -> Result<(), String> {
        let channel = notification.channel;
        if channel == NotificationChannel::Push {
            return Ok(());
        }
        let profile = self.db.fetch_profile(&notification.user_id).await.map_err(|e| e.to_string())?;
        let recipient = match channel {
            NotificationChannel::Email => profile.and_then(|p| p.email),
            NotificationChannel::Sms => profile.and_then(|p| p.phone),
            NotificationChannel::Push => None,
        }
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| format!("{} has no {channel} contact on file", notification.user_id))?;
        self.transport.send(channel, &recipient, &notification.content).await.map_err(|e| e.to_string())
    }
}

fn random_key() -> String {
    format!("notification-{:016x}", rand::random::<u64>())
}
