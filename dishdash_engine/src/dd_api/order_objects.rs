use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, OrderStatusType};

/// Behaviour switches for the order orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFlowConfig {
    /// Refuse `Pending → Confirmed` until the order's payment has completed.
    pub require_payment_before_confirm: bool,
    /// Confirm a `Pending` order as soon as its payment completes.
    pub auto_confirm_on_payment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
    /// Staff may place an order on a customer's behalf. Ignored for customers.
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: OrderStatusType,
}

/// The customer-facing message for an order reaching `status`.
pub fn status_message(order: &Order, status: OrderStatusType) -> String {
    let id = order.id;
    match status {
        OrderStatusType::Pending => {
            format!("Your order #{id} has been placed. Total: {}", order.total_amount)
        },
        OrderStatusType::Confirmed => format!("Good news! The restaurant has confirmed your order #{id}."),
        OrderStatusType::Preparing => format!("Your order #{id} is being prepared."),
        OrderStatusType::Ready => format!("Your order #{id} is ready and waiting for a courier."),
        OrderStatusType::Delivering => format!("Your order #{id} is on its way."),
        OrderStatusType::Delivered => format!("Your order #{id} has been delivered. Enjoy!"),
        OrderStatusType::Cancelled => format!("Your order #{id} has been cancelled."),
    }
}
