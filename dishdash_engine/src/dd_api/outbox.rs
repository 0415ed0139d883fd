//! Dispatching of committed side effects.
//!
//! Order writes record the side effects they imply in the outbox, in the same transaction as the write itself. The
//! [`OutboxDispatcher`] performs them: once inline, straight after the write, and then again on a schedule for
//! anything that failed. The inline pass and the retry sweep can overlap, so an entry is leased before it is performed.
//! Whoever holds the lease does the work and the other side skips the entry.
use std::{fmt::Debug, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewNotification, NotificationStatus, OutboxEntry, SideEffect},
    dd_api::{delivery_api::DeliveryApi, errors::SideEffectError, notification_api::NotificationApi},
    traits::{DeliveryManagement, NotificationManagement, OutboxError, OutboxManagement, ProfileManagement},
};

/// The longest an entry waits between attempts
pub const MAX_BACKOFF_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on a single side effect, including any network calls it makes
    pub timeout: Duration,
    /// Entries that have failed this many times are abandoned
    pub max_attempts: i64,
    /// How many due entries a single retry sweep picks up
    pub batch_size: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(3000), max_attempts: 8, batch_size: 50 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub failed: usize,
    /// Entries that were leased elsewhere, or had already been dispatched
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Dispatched,
    /// Another dispatcher holds the entry, or it no longer needs doing
    Skipped,
}

/// How long to wait after the `attempts`th failure: 2^attempts seconds, up to an hour.
pub fn backoff_delay(attempts: i64) -> chrono::Duration {
    let secs = if attempts >= 12 { MAX_BACKOFF_SECS } else { (1i64 << attempts.max(0)).min(MAX_BACKOFF_SECS) };
    chrono::Duration::seconds(secs)
}

pub struct OutboxDispatcher<B> {
    db: B,
    deliveries: DeliveryApi<B>,
    notifications: NotificationApi<B>,
    config: DispatchConfig,
}

impl<B> Debug for OutboxDispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutboxDispatcher ({:?})", self.config)
    }
}

impl<B: Clone> Clone for OutboxDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            deliveries: self.deliveries.clone(),
            notifications: self.notifications.clone(),
            config: self.config,
        }
    }
}

impl<B> OutboxDispatcher<B> {
    pub fn new(db: B, deliveries: DeliveryApi<B>, notifications: NotificationApi<B>, config: DispatchConfig) -> Self {
        Self { db, deliveries, notifications, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// How long a claimed entry stays out of everyone else's reach. Twice the timeout covers the side effect itself
    /// plus recording its outcome.
    fn lease(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.timeout.saturating_mul(2))
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_BACKOFF_SECS))
    }
}

impl<B> OutboxDispatcher<B>
where B: OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement
{
    /// Performs the entries one after the other. Failures are logged and rescheduled, never returned.
    pub async fn dispatch(&self, entries: Vec<OutboxEntry>) -> DispatchSummary {
        self.dispatch_at(entries, Utc::now()).await
    }

    async fn dispatch_at(&self, entries: Vec<OutboxEntry>, now: DateTime<Utc>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        for entry in entries {
            match self.dispatch_entry_at(&entry, now).await {
                Ok(EntryOutcome::Dispatched) => summary.dispatched += 1,
                Ok(EntryOutcome::Skipped) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Picks up a batch of due entries and dispatches them.
    pub async fn dispatch_due(&self) -> Result<DispatchSummary, OutboxError> {
        self.dispatch_due_at(Utc::now()).await
    }

    /// As [`Self::dispatch_due`], treating `now` as the current time when deciding what is due.
    pub async fn dispatch_due_at(&self, now: DateTime<Utc>) -> Result<DispatchSummary, OutboxError> {
        let entries = self.db.due_outbox_entries(now, self.config.max_attempts, self.config.batch_size).await?;
        if entries.is_empty() {
            return Ok(DispatchSummary::default());
        }
        debug!("📤️ Retrying {} outbox entries", entries.len());
        Ok(self.dispatch_at(entries, now).await)
    }

    /// Claims a single entry, performs it under the side-effect timeout and records the outcome against it.
    pub async fn dispatch_entry(&self, entry: &OutboxEntry) -> Result<EntryOutcome, SideEffectError> {
        self.dispatch_entry_at(entry, Utc::now()).await
    }

    async fn dispatch_entry_at(&self, entry: &OutboxEntry, now: DateTime<Utc>) -> Result<EntryOutcome, SideEffectError> {
        let claimed = self
            .db
            .claim_outbox_entry(entry.id, now, now + self.lease(), self.config.max_attempts)
            .await
            .map_err(|e| SideEffectError::Outbox(e.to_string()))?;
        let Some(entry) = claimed else {
            trace!("📤️ Side effect {} is leased elsewhere or already done. Skipping.", entry.idempotency_key);
            return Ok(EntryOutcome::Skipped);
        };
        let key = entry.idempotency_key.as_str();
        let result = match tokio::time::timeout(self.config.timeout, self.execute(&entry)).await {
            Ok(result) => result,
            Err(_) => Err(SideEffectError::Timeout(self.config.timeout)),
        };
        match result {
            Ok(()) => {
                trace!("📤️ Side effect {key} completed");
                if let Err(e) = self.db.mark_dispatched(entry.id, Utc::now()).await {
                    error!("📤️ Side effect {key} completed, but could not be marked as such: {e}. It will run again.");
                }
                Ok(EntryOutcome::Dispatched)
            },
            Err(err) => {
                let attempts = entry.attempts + 1;
                let next = Utc::now() + backoff_delay(attempts);
                match self.db.record_outbox_failure(entry.id, &err.to_string(), next).await {
                    Ok(updated) if updated.attempts >= self.config.max_attempts => error!(
                        "📤️ Side effect {key} for order #{} has failed {} times and has been abandoned. Last error: \
                         {err}",
                        entry.order_id, updated.attempts
                    ),
                    Ok(updated) => warn!(
                        "📤️ Side effect {key} for order #{} failed (attempt {}): {err}. Retrying after {next}",
                        entry.order_id, updated.attempts
                    ),
                    Err(e) => error!("📤️ Side effect {key} failed ({err}), and the failure could not be recorded: {e}"),
                }
                Err(err)
            },
        }
    }

    async fn execute(&self, entry: &OutboxEntry) -> Result<(), SideEffectError> {
        match &entry.effect.0 {
            SideEffect::AssignDelivery { order_id, customer_id } => {
                let delivery = self
                    .deliveries
                    .assign_for_order(*order_id, customer_id)
                    .await
                    .map_err(|e| SideEffectError::Delivery(e.to_string()))?;
                debug!("📤️ Order #{order_id} has delivery #{} ({})", delivery.id, delivery.status);
                Ok(())
            },
            SideEffect::Notify { user_id, channel, order_id, content } => {
                let notification = NewNotification::new(user_id.clone(), *channel, content.clone())
                    .for_order(*order_id)
                    .with_idempotency_key(entry.idempotency_key.clone());
                let result = self
                    .notifications
                    .dispatch(notification)
                    .await
                    .map_err(|e| SideEffectError::Notification(e.to_string()))?;
                match result.status {
                    NotificationStatus::Sent => Ok(()),
                    NotificationStatus::Failed => Err(SideEffectError::Notification(
                        result.error.unwrap_or_else(|| "delivery failed".to_string()),
                    )),
                }
            },
        }
    }
}
