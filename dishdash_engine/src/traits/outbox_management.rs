use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::OutboxEntry;

#[derive(Debug, Clone, Error)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Outbox entry {0} does not exist")]
    EntryNotFound(i64),
}

impl From<sqlx::Error> for OutboxError {
    fn from(e: sqlx::Error) -> Self {
        OutboxError::DatabaseError(e.to_string())
    }
}

/// Bookkeeping for side effects that have been committed to but not necessarily performed yet.
#[allow(async_fn_in_trait)]
pub trait OutboxManagement {
    /// Undispatched entries whose next attempt is due at `now`, and that have been attempted fewer than
    /// `max_attempts` times. Oldest first.
    async fn due_outbox_entries(
        &self,
        now: DateTime<Utc>,
        max_attempts: i64,
        limit: i64,
    ) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Atomically leases the entry to the caller until `lease_until`. Only one caller can hold an entry at a time: this
    /// returns `None` if the entry is already leased, dispatched, abandoned or not yet due at `now`.
    async fn claim_outbox_entry(
        &self,
        entry_id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<Option<OutboxEntry>, OutboxError>;

    async fn outbox_entries_for_order(&self, order_id: i64) -> Result<Vec<OutboxEntry>, OutboxError>;

    async fn mark_dispatched(&self, entry_id: i64, at: DateTime<Utc>) -> Result<(), OutboxError>;

    /// Increments the attempt counter, stores the error and reschedules the entry. Returns the updated entry.
    async fn record_outbox_failure(
        &self,
        entry_id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxEntry, OutboxError>;
}
