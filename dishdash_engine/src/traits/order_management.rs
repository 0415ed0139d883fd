use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewOutboxEntry, Order, OrderStatusType, OutboxEntry, PaymentStatus},
    traits::OrderQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Invalid order: {0}")]
    Validation(String),
    #[error("An order cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} was modified by someone else. Fetch it and try again.")]
    Conflict(i64),
    #[error("Order {0} cannot be confirmed until its payment has completed")]
    PaymentNotCompleted(i64),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

/// The `OrderManagement` trait defines the behaviour for storing and mutating orders.
///
/// Every write that commits to a side effect takes the side effects along with it. Backends must store the order
/// write and the outbox entries in a single atomic transaction, so that either both are visible or neither is.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in the `Pending` state with the given total. `effects` receives the stored order and
    /// returns the side effects to record alongside it.
    ///
    /// Returns the order and the outbox entries that were written.
    async fn insert_order<F>(
        &self,
        order: NewOrder,
        total_amount: dishdash_common::Cents,
        effects: F,
    ) -> Result<(Order, Vec<OutboxEntry>), OrderFlowError>
    where
        F: FnOnce(&Order) -> Vec<NewOutboxEntry> + Send;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    /// Writes `new_status` if, and only if, the stored order still carries `expected_version`.
    ///
    /// On success, the version is incremented and the new outbox entries are written in the same transaction.
    /// Entries whose idempotency key already exists are skipped. Returns `OrderFlowError::Conflict` if the version
    /// has moved on, and `OrderNotFound` if the order does not exist.
    async fn update_order_status(
        &self,
        order_id: i64,
        expected_version: i64,
        new_status: OrderStatusType,
        effects: Vec<NewOutboxEntry>,
    ) -> Result<(Order, Vec<OutboxEntry>), OrderFlowError>;

    /// Mirrors the payment status onto the order. Returns `None` if the order does not exist.
    async fn set_payment_status(&self, order_id: i64, status: PaymentStatus) -> Result<Option<Order>, OrderFlowError>;

    /// Hard-deletes the order and its pending outbox entries. Returns `false` if there was no such order.
    async fn delete_order(&self, order_id: i64) -> Result<bool, OrderFlowError>;
}
