use chrono::{DateTime, Utc};
use dishdash_common::Cents;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Delivery, DeliveryStatus, NewDelivery},
    traits::DeliveryError,
};

/// Inserts a delivery. A unique-index violation means another delivery for the order is still active.
pub async fn insert_delivery(delivery: NewDelivery, conn: &mut SqliteConnection) -> Result<Delivery, DeliveryError> {
    let now = Utc::now();
    let order_id = delivery.order_id;
    let status =
        if delivery.delivery_person_id.is_some() { DeliveryStatus::Assigned } else { DeliveryStatus::Unassigned };
    let delivery: Delivery = sqlx::query_as(
        r#"
            INSERT INTO deliveries (
                order_id,
                delivery_person_id,
                user_id,
                delivery_address,
                delivery_fee,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(delivery.order_id)
    .bind(delivery.delivery_person_id)
    .bind(delivery.user_id)
    .bind(delivery.delivery_address)
    .bind(delivery.delivery_fee)
    .bind(status)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => DeliveryError::AlreadyActive(order_id),
        _ => DeliveryError::from(e),
    })?;
    debug!("🗃️ Delivery #{} for order #{order_id} inserted as {}", delivery.id, delivery.status);
    Ok(delivery)
}

pub async fn fetch_delivery(delivery_id: i64, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM deliveries WHERE id = $1").bind(delivery_id).fetch_optional(conn).await
}

pub async fn deliveries_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM deliveries WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

pub async fn active_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM deliveries WHERE order_id = $1 AND status NOT IN ('delivered', 'cancelled') LIMIT 1")
        .bind(order_id)
        .fetch_optional(conn)
        .await
}

pub async fn active_for_courier(courier_id: &str, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM deliveries
            WHERE delivery_person_id = $1 AND status NOT IN ('delivered', 'cancelled')
            ORDER BY updated_at DESC, id DESC
            LIMIT 1
        "#,
    )
    .bind(courier_id)
    .fetch_optional(conn)
    .await
}

/// Conditional on the current status, so that concurrent updates cannot both succeed.
pub async fn update_status(
    delivery_id: i64,
    expected: DeliveryStatus,
    new_status: DeliveryStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let now = Utc::now();
    let delivered_at = (new_status == DeliveryStatus::Delivered).then_some(now);
    sqlx::query_as(
        r#"
            UPDATE deliveries SET status = $1, updated_at = $2, delivered_at = COALESCE($3, delivered_at)
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(now)
    .bind(delivered_at)
    .bind(delivery_id)
    .bind(expected)
    .fetch_optional(conn)
    .await
}

pub async fn assign_courier(
    delivery_id: i64,
    courier_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE deliveries SET delivery_person_id = $1, status = $2, updated_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(courier_id)
    .bind(DeliveryStatus::Assigned)
    .bind(Utc::now())
    .bind(delivery_id)
    .bind(DeliveryStatus::Unassigned)
    .fetch_optional(conn)
    .await
}

pub async fn rate(
    delivery_id: i64,
    rating: i64,
    feedback: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE deliveries SET rating = $1, feedback = $2, updated_at = $3
            WHERE id = $4 AND status = $5 AND rating IS NULL
            RETURNING *;
        "#,
    )
    .bind(rating)
    .bind(feedback)
    .bind(Utc::now())
    .bind(delivery_id)
    .bind(DeliveryStatus::Delivered)
    .fetch_optional(conn)
    .await
}

pub async fn record_earnings(
    delivery_id: i64,
    earnings: Cents,
    tip: Cents,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE deliveries SET courier_earnings = $1, tip = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(earnings)
    .bind(tip)
    .bind(Utc::now())
    .bind(delivery_id)
    .fetch_optional(conn)
    .await
}

pub async fn update_location(
    delivery_id: i64,
    latitude: f64,
    longitude: f64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE deliveries SET latitude = $1, longitude = $2, location_updated_at = $3 WHERE id = $4",
    )
    .bind(latitude)
    .bind(longitude)
    .bind(at)
    .bind(delivery_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delivered_since(
    courier_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Delivery>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM deliveries
            WHERE delivery_person_id = $1 AND status = $2 AND delivered_at >= $3
            ORDER BY delivered_at ASC
        "#,
    )
    .bind(courier_id)
    .bind(DeliveryStatus::Delivered)
    .bind(since)
    .fetch_all(conn)
    .await
}
