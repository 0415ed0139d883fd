use chrono::Utc;
use dishdash_common::Cents;
use log::*;
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, PaymentStatus},
    traits::{OrderFlowError, OrderQueryFilter},
};

/// Inserts a new order in the `Pending` state. This is not atomic on its own; pass `&mut *tx` to embed it in a
/// transaction.
pub async fn insert_order(
    order: NewOrder,
    total_amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderFlowError> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (customer_id, restaurant_id, items, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.customer_id)
    .bind(order.restaurant_id)
    .bind(Json(order.items))
    .bind(total_amount)
    .bind(OrderStatusType::Pending)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order #{} inserted for {}", order.id, order.customer_id);
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await
}

/// Fetches orders matching every criterion in the filter, oldest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(rid) = query.restaurant_id {
        where_clause.push("restaurant_id = ");
        where_clause.push_bind_unseparated(rid);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, status) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Compare-and-swap on the order's version. Returns `None` if the order is missing or its version has moved on.
pub async fn update_order_status(
    order_id: i64,
    expected_version: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, version = version + 1, updated_at = $2
            WHERE id = $3 AND version = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(Utc::now())
    .bind(order_id)
    .bind(expected_version)
    .fetch_optional(conn)
    .await
}

pub async fn set_payment_status(
    order_id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_optional(conn)
        .await
}

pub async fn delete_order(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(order_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}
