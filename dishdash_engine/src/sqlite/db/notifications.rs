use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Notification, NotificationStatus},
    traits::NotificationRecord,
};

/// Inserts the record, or overwrites a previous *failed* attempt with the same idempotency key. Returns `None` if a
/// sent record with that key already exists.
pub async fn upsert(record: NotificationRecord, conn: &mut SqliteConnection) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO notifications (user_id, channel, content, order_id, idempotency_key, status, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (idempotency_key) DO UPDATE SET
                content = excluded.content,
                status = excluded.status,
                error = excluded.error,
                created_at = excluded.created_at
            WHERE notifications.status = $9
            RETURNING *;
        "#,
    )
    .bind(record.user_id)
    .bind(record.channel)
    .bind(record.content)
    .bind(record.order_id)
    .bind(record.idempotency_key)
    .bind(record.status)
    .bind(record.error)
    .bind(Utc::now())
    .bind(NotificationStatus::Failed)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_by_key(key: &str, conn: &mut SqliteConnection) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM notifications WHERE idempotency_key = $1").bind(key).fetch_optional(conn).await
}

pub async fn for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

pub async fn mark_read(id: i64, user_id: &str, conn: &mut SqliteConnection) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *")
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}
