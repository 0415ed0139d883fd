//! `SqliteDatabase` is a concrete implementation of a DishDash engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dishdash_common::Cents;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{db_url, deliveries, locations, new_pool, notifications, orders, outbox, payments, profiles};
use crate::{
    db_types::{
        Delivery,
        DeliveryStatus,
        LocationRecord,
        NewDelivery,
        NewOrder,
        NewOutboxEntry,
        NewPayment,
        Notification,
        Order,
        OrderStatusType,
        OutboxEntry,
        Payment,
        PaymentStatus,
        UserProfile,
    },
    traits::{
        DeliveryError,
        DeliveryManagement,
        LocationError,
        LocationManagement,
        NotificationError,
        NotificationManagement,
        NotificationRecord,
        OrderFlowError,
        OrderManagement,
        OrderQueryFilter,
        OutboxError,
        OutboxManagement,
        PaymentApiError,
        PaymentManagement,
        ProfileError,
        ProfileManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order<F>(
        &self,
        order: NewOrder,
        total_amount: Cents,
        effects: F,
    ) -> Result<(Order, Vec<OutboxEntry>), OrderFlowError>
    where
        F: FnOnce(&Order) -> Vec<NewOutboxEntry> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, total_amount, &mut tx).await?;
        let mut entries = Vec::new();
        for entry in effects(&order) {
            if let Some(entry) = outbox::idempotent_insert(entry, &mut tx).await? {
                entries.push(entry);
            }
        }
        tx.commit().await?;
        trace!("🗃️ Order #{} committed with {} outbox entries", order.id, entries.len());
        Ok((order, entries))
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::search_orders(query, &mut conn).await?;
        Ok(result)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        expected_version: i64,
        new_status: OrderStatusType,
        effects: Vec<NewOutboxEntry>,
    ) -> Result<(Order, Vec<OutboxEntry>), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::update_order_status(order_id, expected_version, new_status, &mut tx).await? {
            Some(order) => order,
            None => {
                let exists = orders::fetch_order(order_id, &mut tx).await?.is_some();
                tx.rollback().await?;
                return if exists {
                    debug!("🗃️ Order #{order_id} is no longer at version {expected_version}");
                    Err(OrderFlowError::Conflict(order_id))
                } else {
                    Err(OrderFlowError::OrderNotFound(order_id))
                };
            },
        };
        let mut entries = Vec::with_capacity(effects.len());
        for entry in effects {
            if let Some(entry) = outbox::idempotent_insert(entry, &mut tx).await? {
                entries.push(entry);
            }
        }
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} is now {new_status} (v{}). {} side effects queued", order.version, entries.len());
        Ok((order, entries))
    }

    async fn set_payment_status(&self, order_id: i64, status: PaymentStatus) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_payment_status(order_id, status, &mut conn).await?;
        Ok(order)
    }

    async fn delete_order(&self, order_id: i64) -> Result<bool, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let deleted = orders::delete_order(order_id, &mut tx).await?;
        if deleted {
            let n = outbox::delete_pending_for_order(order_id, &mut tx).await?;
            trace!("🗃️ Order #{order_id} deleted along with {n} pending outbox entries");
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

impl OutboxManagement for SqliteDatabase {
    async fn due_outbox_entries(
        &self,
        now: DateTime<Utc>,
        max_attempts: i64,
        limit: i64,
    ) -> Result<Vec<OutboxEntry>, OutboxError> {
        let mut conn = self.pool.acquire().await?;
        let entries = outbox::due_entries(now, max_attempts, limit, &mut conn).await?;
        Ok(entries)
    }

    async fn claim_outbox_entry(
        &self,
        entry_id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        max_attempts: i64,
    ) -> Result<Option<OutboxEntry>, OutboxError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = outbox::claim(entry_id, now, lease_until, max_attempts, &mut conn).await?;
        Ok(claimed)
    }

    async fn outbox_entries_for_order(&self, order_id: i64) -> Result<Vec<OutboxEntry>, OutboxError> {
        let mut conn = self.pool.acquire().await?;
        let entries = outbox::entries_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }

    async fn mark_dispatched(&self, entry_id: i64, at: DateTime<Utc>) -> Result<(), OutboxError> {
        let mut conn = self.pool.acquire().await?;
        match outbox::mark_dispatched(entry_id, at, &mut conn).await? {
            0 => Err(OutboxError::EntryNotFound(entry_id)),
            _ => Ok(()),
        }
    }

    async fn record_outbox_failure(
        &self,
        entry_id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<OutboxEntry, OutboxError> {
        let mut conn = self.pool.acquire().await?;
        outbox::record_failure(entry_id, error, next_attempt_at, &mut conn)
            .await?
            .ok_or(OutboxError::EntryNotFound(entry_id))
    }
}

impl DeliveryManagement for SqliteDatabase {
    async fn insert_delivery(&self, delivery: NewDelivery) -> Result<Delivery, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        deliveries::insert_delivery(delivery, &mut conn).await
    }

    async fn fetch_delivery(&self, delivery_id: i64) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::fetch_delivery(delivery_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn deliveries_for_order(&self, order_id: i64) -> Result<Vec<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let result = deliveries::deliveries_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn active_delivery_for_order(&self, order_id: i64) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::active_for_order(order_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn active_delivery_for_courier(&self, courier_id: &str) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::active_for_courier(courier_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn update_delivery_status(
        &self,
        delivery_id: i64,
        expected: DeliveryStatus,
        new_status: DeliveryStatus,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::update_status(delivery_id, expected, new_status, &mut conn).await?;
        Ok(delivery)
    }

    async fn assign_courier(&self, delivery_id: i64, courier_id: &str) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::assign_courier(delivery_id, courier_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn rate_delivery(
        &self,
        delivery_id: i64,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::rate(delivery_id, rating, feedback, &mut conn).await?;
        Ok(delivery)
    }

    async fn record_earnings(
        &self,
        delivery_id: i64,
        earnings: Cents,
        tip: Cents,
    ) -> Result<Option<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::record_earnings(delivery_id, earnings, tip, &mut conn).await?;
        Ok(delivery)
    }

    async fn update_delivery_location(
        &self,
        delivery_id: i64,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        match deliveries::update_location(delivery_id, latitude, longitude, at, &mut conn).await? {
            0 => Err(DeliveryError::NotFound(delivery_id)),
            _ => Ok(()),
        }
    }

    async fn delivered_since(&self, courier_id: &str, since: DateTime<Utc>) -> Result<Vec<Delivery>, DeliveryError> {
        let mut conn = self.pool.acquire().await?;
        let result = deliveries::delivered_since(courier_id, since, &mut conn).await?;
        Ok(result)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, &mut conn).await
    }

    async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_by_intent(intent_id, &mut conn).await?;
        Ok(payment)
    }

    async fn payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let result = payments::payments_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn update_payment_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, PaymentApiError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::update_status(intent_id, status, &mut conn).await?;
        Ok(payment)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn record_notification(&self, record: NotificationRecord) -> Result<Notification, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let key = record.idempotency_key.clone();
        match notifications::upsert(record, &mut conn).await? {
            Some(n) => Ok(n),
            None => {
                trace!("🗃️ Notification {key} was already sent. Keeping the original record.");
                notifications::fetch_by_key(&key, &mut conn)
                    .await?
                    .ok_or_else(|| NotificationError::DatabaseError(format!("Notification {key} vanished")))
            },
        }
    }

    async fn notification_by_key(&self, key: &str) -> Result<Option<Notification>, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let n = notifications::fetch_by_key(key, &mut conn).await?;
        Ok(n)
    }

    async fn notifications_for_user(&self, user_id: &str) -> Result<Vec<Notification>, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::for_user(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn mark_read(&self, notification_id: i64, user_id: &str) -> Result<Option<Notification>, NotificationError> {
        let mut conn = self.pool.acquire().await?;
        let n = notifications::mark_read(notification_id, user_id, &mut conn).await?;
        Ok(n)
    }
}

impl LocationManagement for SqliteDatabase {
    async fn upsert_location(
        &self,
        agent_id: &str,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> Result<LocationRecord, LocationError> {
        let mut conn = self.pool.acquire().await?;
        let record = locations::upsert(agent_id, latitude, longitude, at, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_location(&self, agent_id: &str) -> Result<Option<LocationRecord>, LocationError> {
        let mut conn = self.pool.acquire().await?;
        let record = locations::fetch(agent_id, &mut conn).await?;
        Ok(record)
    }
}

impl ProfileManagement for SqliteDatabase {
    async fn upsert_profile(&self, profile: UserProfile) -> Result<UserProfile, ProfileError> {
        let mut conn = self.pool.acquire().await?;
        let profile = profiles::upsert(profile, &mut conn).await?;
        Ok(profile)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, ProfileError> {
        let mut conn = self.pool.acquire().await?;
        let profile = profiles::fetch(user_id, &mut conn).await?;
        Ok(profile)
    }

    async fn add_address(&self, user_id: &str, address: &str) -> Result<(), ProfileError> {
        let mut conn = self.pool.acquire().await?;
        profiles::add_address(user_id, address, &mut conn).await?;
        Ok(())
    }

    async fn addresses_for_user(&self, user_id: &str) -> Result<Vec<String>, ProfileError> {
        let mut conn = self.pool.acquire().await?;
        let result = profiles::addresses(user_id, &mut conn).await?;
        Ok(result)
    }

    async fn first_available_courier(&self) -> Result<Option<String>, ProfileError> {
        let mut conn = self.pool.acquire().await?;
        let courier = profiles::first_available_courier(&mut conn).await?;
        Ok(courier)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `DD_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
