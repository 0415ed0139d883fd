use std::fmt::Display;

use dishdash_engine::{
    db_types::{OrderStatusType, Role},
    dd_api::{delivery_objects::EarningsPeriod, payment_objects::WebhookOutcome},
    traits::OrderQueryFilter,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub customer_id: Option<String>,
    pub restaurant_id: Option<String>,
    pub status: Option<OrderStatusType>,
}

impl From<OrderSearchParams> for OrderQueryFilter {
    fn from(params: OrderSearchParams) -> Self {
        let mut filter = OrderQueryFilter::default();
        if let Some(customer_id) = params.customer_id {
            filter = filter.with_customer_id(customer_id);
        }
        if let Some(restaurant_id) = params.restaurant_id {
            filter = filter.with_restaurant_id(restaurant_id);
        }
        if let Some(status) = params.status {
            filter = filter.with_status(status);
        }
        filter
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EarningsQuery {
    #[serde(default)]
    pub period: EarningsPeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
}

/// The profile fields the user service pushes to us. `address`, if given, is appended to the user's addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub role: Role,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub address: Option<String>,
}

/// What the payment processor is told about its webhook. Any 2xx stops it retrying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

impl From<&WebhookOutcome> for WebhookAck {
    fn from(outcome: &WebhookOutcome) -> Self {
        let outcome = match outcome {
            WebhookOutcome::Updated(p) => format!("payment {} is now {}", p.external_intent_id, p.status),
            WebhookOutcome::Unchanged(p) => format!("payment {} is already {}", p.external_intent_id, p.status),
            WebhookOutcome::UnknownIntent(id) => format!("no payment for intent {id}"),
            WebhookOutcome::Ignored(event_type) => format!("{event_type} ignored"),
        };
        Self { received: true, outcome }
    }
}
