use chrono::{DateTime, Utc};
use log::*;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{NewOutboxEntry, OutboxEntry};

/// Writes the entry unless one with the same idempotency key already exists. Returns the entry if it was written.
pub async fn idempotent_insert(
    entry: NewOutboxEntry,
    conn: &mut SqliteConnection,
) -> Result<Option<OutboxEntry>, sqlx::Error> {
    let now = Utc::now();
    let key = entry.idempotency_key.clone();
    let inserted: Option<OutboxEntry> = sqlx::query_as(
        r#"
            INSERT INTO outbox (idempotency_key, order_id, effect, next_attempt_at, created_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(entry.idempotency_key)
    .bind(entry.order_id)
    .bind(Json(entry.effect))
    .bind(now)
    .fetch_optional(conn)
    .await?;
    if inserted.is_none() {
        debug!("🗃️ Outbox entry {key} already exists. Skipping.");
    }
    Ok(inserted)
}

pub async fn due_entries(
    now: DateTime<Utc>,
    max_attempts: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OutboxEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM outbox
            WHERE dispatched_at IS NULL AND attempts < $1 AND next_attempt_at <= $2
            ORDER BY next_attempt_at ASC, id ASC
            LIMIT $3
        "#,
    )
    .bind(max_attempts)
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await
}

/// Takes a lease on the entry by pushing its next attempt out to `lease_until`, provided it is still undispatched,
/// due at `now` and under `max_attempts`. Returns the claimed entry, or `None` if someone else holds it or it no longer
/// needs doing.
pub async fn claim(
    entry_id: i64,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    max_attempts: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<OutboxEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE outbox SET next_attempt_at = $1
            WHERE id = $2 AND dispatched_at IS NULL AND attempts < $3 AND next_attempt_at <= $4
            RETURNING *;
        "#,
    )
    .bind(lease_until)
    .bind(entry_id)
    .bind(max_attempts)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn entries_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OutboxEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM outbox WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

pub async fn mark_dispatched(entry_id: i64, at: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE outbox SET dispatched_at = $1, last_error = NULL WHERE id = $2")
        .bind(at)
        .bind(entry_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn record_failure(
    entry_id: i64,
    error: &str,
    next_attempt_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<OutboxEntry>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE outbox SET attempts = attempts + 1, last_error = $1, next_attempt_at = $2
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(next_attempt_at)
    .bind(entry_id)
    .fetch_optional(conn)
    .await
}

/// Removes entries for the order that were never dispatched.
pub async fn delete_pending_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM outbox WHERE order_id = $1 AND dispatched_at IS NULL")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
