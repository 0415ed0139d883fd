use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub order_id: i64,
    pub status: OrderStatusType,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLocationUpdate {
    pub agent_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub order_id: i64,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPushed {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Everything that can be pushed to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum BusEvent {
    OrderStatusUpdate(OrderStatusUpdate),
    DeliveryLocationUpdate(DeliveryLocationUpdate),
    PaymentStatusUpdate(PaymentStatusUpdate),
    Notification(NotificationPushed),
}

impl BusEvent {
    pub fn order_status(order_id: i64, status: OrderStatusType, updated_at: DateTime<Utc>) -> Self {
        Self::OrderStatusUpdate(OrderStatusUpdate { order_id, status, updated_at })
    }

    pub fn location<S: Into<String>>(agent_id: S, latitude: f64, longitude: f64) -> Self {
        Self::DeliveryLocationUpdate(DeliveryLocationUpdate { agent_id: agent_id.into(), latitude, longitude })
    }

    pub fn payment_status(order_id: i64, status: PaymentStatus) -> Self {
        Self::PaymentStatusUpdate(PaymentStatusUpdate { order_id, status })
    }

    pub fn notification<S: Into<String>>(id: i64, content: S, created_at: DateTime<Utc>) -> Self {
        Self::Notification(NotificationPushed { id, content: content.into(), created_at })
    }

    /// The wire name of the event, as clients see it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderStatusUpdate(_) => "orderStatusUpdate",
            Self::DeliveryLocationUpdate(_) => "deliveryLocationUpdate",
            Self::PaymentStatusUpdate(_) => "paymentStatusUpdate",
            Self::Notification(_) => "notification",
        }
    }

    /// Formats the event as a Server-Sent-Events frame.
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Self::OrderStatusUpdate(e) => serde_json::to_string(e)?,
            Self::DeliveryLocationUpdate(e) => serde_json::to_string(e)?,
            Self::PaymentStatusUpdate(e) => serde_json::to_string(e)?,
            Self::Notification(e) => serde_json::to_string(e)?,
        };
        Ok(format!("event: {}\ndata: {data}\n\n", self.name()))
    }
}
