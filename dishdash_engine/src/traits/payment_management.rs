use thiserror::Error;

use crate::db_types::{NewPayment, Payment, PaymentStatus};

#[derive(Debug, Clone, Error)]
pub enum PaymentApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid payment request: {0}")]
    Validation(String),
    #[error("The payment processor could not create an intent: {0}")]
    Gateway(String),
    #[error("Webhook signature verification failed: {0}")]
    WebhookSignature(String),
    #[error("Webhook payload could not be understood: {0}")]
    MalformedEvent(String),
    #[error("A payment with intent id {0} already exists")]
    DuplicateIntent(String),
}

impl From<sqlx::Error> for PaymentApiError {
    fn from(e: sqlx::Error) -> Self {
        PaymentApiError::DatabaseError(e.to_string())
    }
}

/// Storage for local payment records.
///
/// Reconciliation always joins on the processor's intent id, never on the payment or order id.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Stores a new payment in the `pending` state.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentApiError>;

    async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, PaymentApiError>;

    async fn payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PaymentApiError>;

    /// Moves the payment to `status`. Returns `None` when nothing changed: the intent is unknown, the payment already
    /// carries `status`, or it is `completed` (which is never overwritten).
    async fn update_payment_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, PaymentApiError>;
}
