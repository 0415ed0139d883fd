use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    traits::PaymentApiError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, PaymentApiError> {
    let now = Utc::now();
    let intent = payment.external_intent_id.clone();
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, user_id, amount, payment_method, status, external_intent_id, created_at,
                updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.user_id)
    .bind(payment.amount)
    .bind(payment.payment_method)
    .bind(PaymentStatus::Pending)
    .bind(payment.external_intent_id)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => PaymentApiError::DuplicateIntent(intent),
        _ => PaymentApiError::from(e),
    })?;
    debug!("🗃️ Payment #{} for order #{} stored against intent {}", payment.id, payment.order_id, payment.external_intent_id);
    Ok(payment)
}

pub async fn fetch_by_intent(intent_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE external_intent_id = $1").bind(intent_id).fetch_optional(conn).await
}

pub async fn payments_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

/// Only writes if the status actually changes, and never moves a payment out of `completed`.
pub async fn update_status(
    intent_id: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = $1, updated_at = $2
            WHERE external_intent_id = $3 AND status != $1 AND status != $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(Utc::now())
    .bind(intent_id)
    .bind(PaymentStatus::Completed)
    .fetch_optional(conn)
    .await
}
