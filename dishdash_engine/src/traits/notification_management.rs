use thiserror::Error;

use crate::{db_types::Notification, traits::NotificationRecord};

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid notification: {0}")]
    Validation(String),
    #[error("Notification {0} does not exist")]
    NotFound(i64),
}

impl From<sqlx::Error> for NotificationError {
    fn from(e: sqlx::Error) -> Self {
        NotificationError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait NotificationManagement {
    /// Records the outcome of a dispatch attempt.
    ///
    /// If a record with the same idempotency key exists and has failed, it is overwritten with the new outcome. A
    /// record that has already been sent is never overwritten; it is returned unchanged.
    async fn record_notification(&self, record: NotificationRecord) -> Result<Notification, NotificationError>;

    async fn notification_by_key(&self, key: &str) -> Result<Option<Notification>, NotificationError>;

    /// Newest first
    async fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>, NotificationError>;

    /// Sets the read flag. Returns `None` if there is no such notification belonging to `user_id`.
    async fn mark_read(&self, notification_id: i64, user_id: &str) -> Result<Option<Notification>, NotificationError>;
}
