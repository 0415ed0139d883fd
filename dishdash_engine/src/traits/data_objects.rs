use serde::{Deserialize, Serialize};

use crate::db_types::{NotificationChannel, NotificationStatus, OrderStatusType};

/// The outcome of a single notification attempt, ready to be written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub user_id: String,
    pub channel: NotificationChannel,
    pub content: String,
    pub order_id: Option<i64>,
    pub idempotency_key: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub customer_id: Option<String>,
    pub restaurant_id: Option<String>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_restaurant_id<S: Into<String>>(mut self, restaurant_id: S) -> Self {
        self.restaurant_id = Some(restaurant_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() && self.restaurant_id.is_none() && self.status.is_none()
    }
}
