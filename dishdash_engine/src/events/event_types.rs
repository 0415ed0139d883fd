use serde::{Deserialize, Serialize};

use crate::db_types::{Delivery, DeliveryStatus, Order, OrderStatusType, Payment};

/// Emitted after an order status write has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

/// Emitted when a webhook changes the status of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatedEvent {
    pub payment: Payment,
}

impl PaymentUpdatedEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStatusChangedEvent {
    pub delivery: Delivery,
    pub old_status: DeliveryStatus,
}

impl DeliveryStatusChangedEvent {
    pub fn new(delivery: Delivery, old_status: DeliveryStatus) -> Self {
        Self { delivery, old_status }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentUpdated(PaymentUpdatedEvent),
    DeliveryStatusChanged(DeliveryStatusChangedEvent),
}
