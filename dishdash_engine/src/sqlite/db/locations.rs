use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::LocationRecord;

/// Last write wins. A report with an older timestamp than the stored one still replaces it.
pub async fn upsert(
    agent_id: &str,
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LocationRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO locations (agent_id, latitude, longitude, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (agent_id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(agent_id)
    .bind(latitude)
    .bind(longitude)
    .bind(at)
    .fetch_one(conn)
    .await
}

pub async fn fetch(agent_id: &str, conn: &mut SqliteConnection) -> Result<Option<LocationRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM locations WHERE agent_id = $1").bind(agent_id).fetch_optional(conn).await
}
