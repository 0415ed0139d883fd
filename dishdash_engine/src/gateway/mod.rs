//! The boundary with the external payment processor.
//!
//! Outbound, a [`PaymentGateway`] creates payment intents. Inbound, the processor confirms the outcome of an intent
//! with a signed webhook, which is authenticated by [`verify_webhook_signature`].
mod http_gateway;
mod webhook_signature;

use async_trait::async_trait;
pub use http_gateway::HttpPaymentGateway;
use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use webhook_signature::{sign_webhook_payload, verify_webhook_signature, WebhookSignatureError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// The amount to charge, in minor currency units
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Handed to the client so that it can complete the payment with the processor directly.
    pub client_secret: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment processor: {0}")]
    Transport(String),
    #[error("The payment processor rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment processor sent a response that could not be understood: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError>;
}
