use chrono::{DateTime, Utc};
use dishdash_common::Cents;
use thiserror::Error;

use crate::db_types::{Delivery, DeliveryStatus, NewDelivery};

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Delivery {0} does not exist")]
    NotFound(i64),
    #[error("Invalid delivery request: {0}")]
    Validation(String),
    #[error("A delivery cannot move from {from} to {to}")]
    InvalidTransition { from: DeliveryStatus, to: DeliveryStatus },
    #[error("Order {0} already has an active delivery")]
    AlreadyActive(i64),
    #[error("Delivery {0} has already been rated")]
    AlreadyRated(i64),
    #[error("Delivery {0} cannot be rated until it has been delivered")]
    NotRateable(i64),
    #[error("Delivery {0} was modified by someone else. Fetch it and try again.")]
    Conflict(i64),
    #[error("Delivery {0} is not assigned to you")]
    NotYourDelivery(i64),
}

impl From<sqlx::Error> for DeliveryError {
    fn from(e: sqlx::Error) -> Self {
        DeliveryError::DatabaseError(e.to_string())
    }
}

/// Storage for deliveries.
///
/// Backends must guarantee that at most one non-terminal delivery exists per order, and report an attempt to create
/// a second one as [`DeliveryError::AlreadyActive`].
#[allow(async_fn_in_trait)]
pub trait DeliveryManagement {
    /// Stores a new delivery. It is `assigned` if a courier is given, `unassigned` otherwise.
    async fn insert_delivery(&self, delivery: NewDelivery) -> Result<Delivery, DeliveryError>;

    async fn fetch_delivery(&self, delivery_id: i64) -> Result<Option<Delivery>, DeliveryError>;

    async fn deliveries_for_order(&self, order_id: i64) -> Result<Vec<Delivery>, DeliveryError>;

    async fn active_delivery_for_order(&self, order_id: i64) -> Result<Option<Delivery>, DeliveryError>;

    /// The delivery the courier is currently working on, if any.
    async fn active_delivery_for_courier(&self, courier_id: &str) -> Result<Option<Delivery>, DeliveryError>;

    /// Writes `new_status` only if the delivery is still in `expected`. Returns `None` otherwise.
    async fn update_delivery_status(
        &self,
        delivery_id: i64,
        expected: DeliveryStatus,
        new_status: DeliveryStatus,
    ) -> Result<Option<Delivery>, DeliveryError>;

    /// Hands an unassigned delivery to a courier. Returns `None` if the delivery is not unassigned.
    async fn assign_courier(&self, delivery_id: i64, courier_id: &str) -> Result<Option<Delivery>, DeliveryError>;

    /// Stores a rating on a delivered, unrated delivery. Returns `None` if either condition does not hold.
    async fn rate_delivery(
        &self,
        delivery_id: i64,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<Option<Delivery>, DeliveryError>;

    async fn record_earnings(
        &self,
        delivery_id: i64,
        earnings: Cents,
        tip: Cents,
    ) -> Result<Option<Delivery>, DeliveryError>;

    async fn update_delivery_location(
        &self,
        delivery_id: i64,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<(), DeliveryError>;

    /// The courier's deliveries that reached `delivered` at or after `since`.
    async fn delivered_since(&self, courier_id: &str, since: DateTime<Utc>) -> Result<Vec<Delivery>, DeliveryError>;
}
