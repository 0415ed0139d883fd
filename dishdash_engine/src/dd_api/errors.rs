use std::time::Duration;

use thiserror::Error;

/// A side effect of an order transition that could not be completed.
///
/// These errors are never returned to the client that caused the transition. They are logged, recorded against the
/// outbox entry and retried later.
#[derive(Debug, Clone, Error)]
pub enum SideEffectError {
    #[error("Delivery assignment failed: {0}")]
    Delivery(String),
    #[error("Notification failed: {0}")]
    Notification(String),
    #[error("The side effect did not complete within {0:?}")]
    Timeout(Duration),
    #[error("Could not access the outbox: {0}")]
    Outbox(String),
}
