use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{Role, UserProfile};

pub async fn upsert(profile: UserProfile, conn: &mut SqliteConnection) -> Result<UserProfile, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO profiles (user_id, role, email, phone, available, created_at) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                role = excluded.role,
                email = excluded.email,
                phone = excluded.phone,
                available = excluded.available
            RETURNING *;
        "#,
    )
    .bind(profile.user_id)
    .bind(profile.role)
    .bind(profile.email)
    .bind(profile.phone)
    .bind(profile.available)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn fetch(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM profiles WHERE user_id = $1").bind(user_id).fetch_optional(conn).await
}

pub async fn add_address(user_id: &str, address: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO addresses (user_id, address) VALUES ($1, $2)")
        .bind(user_id)
        .bind(address)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn addresses(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT address FROM addresses WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(rows.into_iter().map(|(a,)| a).collect())
}

/// A linear scan in registration order. Couriers who are already on an active delivery are skipped.
pub async fn first_available_courier(conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
            SELECT user_id FROM profiles
            WHERE role = $1 AND available = TRUE AND user_id NOT IN (
                SELECT delivery_person_id FROM deliveries
                WHERE delivery_person_id IS NOT NULL AND status NOT IN ('delivered', 'cancelled')
            )
            ORDER BY created_at ASC, rowid ASC
            LIMIT 1
        "#,
    )
    .bind(Role::DeliveryPerson)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(id,)| id))
}
