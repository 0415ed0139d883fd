use dishdash_common::{Cents, Secret};
use serde::{Deserialize, Serialize};

use crate::db_types::{Payment, PaymentMethod, PaymentStatus};

pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Default)]
pub struct PaymentConfig {
    pub currency: String,
    pub webhook_secret: Secret<String>,
    /// How old a webhook signature may be, in seconds. Zero disables the check.
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: i64,
    pub amount: Cents,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCreated {
    pub payment: Payment,
    pub client_secret: String,
}

/// The parts of a processor event that reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookObject {
    /// The payment intent id
    pub id: String,
}

impl WebhookEvent {
    /// The payment status this event moves its intent to, if it is an event we act on.
    pub fn target_status(&self) -> Option<PaymentStatus> {
        match self.event_type.as_str() {
            INTENT_SUCCEEDED => Some(PaymentStatus::Completed),
            INTENT_FAILED => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn intent_id(&self) -> &str {
        self.data.object.id.as_str()
    }
}

/// What a verified webhook did. All of these are acknowledged to the processor as successes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payment status changed.
    Updated(Payment),
    /// A replay, or an attempt to downgrade a completed payment.
    Unchanged(Payment),
    /// No payment carries this intent id.
    UnknownIntent(String),
    /// An event type that is not acted on.
    Ignored(String),
}
