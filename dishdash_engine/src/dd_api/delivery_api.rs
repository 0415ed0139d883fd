use std::fmt::Debug;

use chrono::{DateTime, Utc};
use dishdash_common::Cents;
use log::*;

use crate::{
    db_types::{Delivery, DeliveryStatus, NewDelivery},
    dd_api::delivery_objects::{EarningsPeriod, EarningsSummary},
    events::{DeliveryStatusChangedEvent, EventProducers},
    traits::{DeliveryError, DeliveryManagement, ProfileManagement},
};

/// Used when the customer has no address on file. The courier will have to call them.
pub const ADDRESS_NOT_ON_FILE: &str = "Address not on file: contact customer";

/// `DeliveryApi` assigns deliveries to couriers and tracks them through to completion.
///
/// Delivery status is independent of the order status. Status changes are reported through the
/// `on_delivery_status_changed` hook, and nothing else happens automatically.
pub struct DeliveryApi<B> {
    db: B,
    producers: EventProducers,
    default_fee: Cents,
}

impl<B> Debug for DeliveryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryApi")
    }
}

impl<B: Clone> Clone for DeliveryApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone(), default_fee: self.default_fee }
    }
}

impl<B> DeliveryApi<B> {
    pub fn new(db: B, producers: EventProducers, default_fee: Cents) -> Self {
        Self { db, producers, default_fee }
    }

    pub fn default_fee(&self) -> Cents {
        self.default_fee
    }
}

impl<B> DeliveryApi<B>
where B: DeliveryManagement + ProfileManagement
{
    /// Creates a delivery for an order.
    ///
    /// If no courier is named, the first available courier is picked. If nobody is available, the delivery is stored
    /// as `unassigned` and can be handed out later with [`Self::assign_courier`].
    ///
    /// Fails with [`DeliveryError::AlreadyActive`] if the order already has a delivery in progress.
    pub async fn assign(&self, mut delivery: NewDelivery) -> Result<Delivery, DeliveryError> {
        if delivery.user_id.trim().is_empty() {
            return Err(DeliveryError::Validation("The customer id cannot be empty".into()));
        }
        if delivery.delivery_address.trim().is_empty() {
            return Err(DeliveryError::Validation("The delivery address cannot be empty".into()));
        }
        if delivery.delivery_fee.is_negative() {
            return Err(DeliveryError::Validation("The delivery fee cannot be negative".into()));
        }
        if delivery.delivery_person_id.is_none() {
            match self.db.first_available_courier().await {
                Ok(Some(courier)) => {
                    debug!("🚚️ Auto-assigning {courier} to order #{}", delivery.order_id);
                    delivery.delivery_person_id = Some(courier);
                },
                Ok(None) => info!("🚚️ No courier is available for order #{}. It stays unassigned.", delivery.order_id),
                Err(e) => warn!("🚚️ Could not look for an available courier: {e}. Order #{} stays unassigned.", delivery.order_id),
            }
        }
        let delivery = self.db.insert_delivery(delivery).await?;
        info!("🚚️ Delivery #{} created for order #{} ({})", delivery.id, delivery.order_id, delivery.status);
        Ok(delivery)
    }

    /// Creates the delivery for a newly confirmed order, resolving the address from the customer's profile and
    /// charging the default fee.
    ///
    /// Idempotent: if the order already has an active delivery, that delivery is returned.
    pub async fn assign_for_order(&self, order_id: i64, customer_id: &str) -> Result<Delivery, DeliveryError> {
        if let Some(existing) = self.db.active_delivery_for_order(order_id).await? {
            debug!("🚚️ Order #{order_id} already has delivery #{}. Nothing to do.", existing.id);
            return Ok(existing);
        }
        let address = self.resolve_address(customer_id).await;
        let request = NewDelivery::new(order_id, customer_id, address, self.default_fee);
        match self.assign(request).await {
            Err(DeliveryError::AlreadyActive(_)) => {
                debug!("🚚️ Lost the race to create a delivery for order #{order_id}. Using the winner's.");
                self.db.active_delivery_for_order(order_id).await?.ok_or(DeliveryError::AlreadyActive(order_id))
            },
            other => other,
        }
    }

    async fn resolve_address(&self, customer_id: &str) -> String {
        match self.db.addresses_for_user(customer_id).await {
            Ok(addresses) => addresses.into_iter().next().unwrap_or_else(|| {
                warn!("🚚️ {customer_id} has no address on file. Using a placeholder.");
                ADDRESS_NOT_ON_FILE.to_string()
            }),
            Err(e) => {
                warn!("🚚️ Could not fetch addresses for {customer_id}: {e}. Using a placeholder.");
                ADDRESS_NOT_ON_FILE.to_string()
            },
        }
    }

    /// Moves a delivery along `assigned → picked_up → delivering → delivered`, or cancels it.
    pub async fn update_status(&self, delivery_id: i64, new_status: DeliveryStatus) -> Result<Delivery, DeliveryError> {
        self.change_status(delivery_id, new_status, None).await
    }

    /// As [`Self::update_status`], but fails with [`DeliveryError::NotYourDelivery`] unless `courier_id` is the
    /// assigned courier.
    pub async fn update_status_for_courier(
        &self,
        delivery_id: i64,
        courier_id: &str,
        new_status: DeliveryStatus,
    ) -> Result<Delivery, DeliveryError> {
        self.change_status(delivery_id, new_status, Some(courier_id)).await
    }

    async fn change_status(
        &self,
        delivery_id: i64,
        new_status: DeliveryStatus,
        courier_id: Option<&str>,
    ) -> Result<Delivery, DeliveryError> {
        let delivery = self.fetch_delivery(delivery_id).await?;
        if let Some(courier) = courier_id {
            if delivery.delivery_person_id.as_deref() != Some(courier) {
                return Err(DeliveryError::NotYourDelivery(delivery_id));
            }
        }
        let old_status = delivery.status;
        if !old_status.can_transition_to(new_status) || new_status == DeliveryStatus::Assigned {
            return Err(DeliveryError::InvalidTransition { from: old_status, to: new_status });
        }
        let updated = self
            .db
            .update_delivery_status(delivery_id, old_status, new_status)
            .await?
            .ok_or(DeliveryError::Conflict(delivery_id))?;
        info!("🚚️ Delivery #{delivery_id} moved from {old_status} to {new_status}");
        self.call_status_changed_hook(&updated, old_status).await;
        Ok(updated)
    }

    /// Hands an unassigned delivery to a courier.
    pub async fn assign_courier(&self, delivery_id: i64, courier_id: &str) -> Result<Delivery, DeliveryError> {
        if courier_id.trim().is_empty() {
            return Err(DeliveryError::Validation("The courier id cannot be empty".into()));
        }
        let delivery = self.fetch_delivery(delivery_id).await?;
        if delivery.status != DeliveryStatus::Unassigned {
            return Err(DeliveryError::InvalidTransition { from: delivery.status, to: DeliveryStatus::Assigned });
        }
        let updated =
            self.db.assign_courier(delivery_id, courier_id).await?.ok_or(DeliveryError::Conflict(delivery_id))?;
        info!("🚚️ {courier_id} has been assigned delivery #{delivery_id}");
        self.call_status_changed_hook(&updated, DeliveryStatus::Unassigned).await;
        Ok(updated)
    }

    /// Rates a delivered delivery. Each delivery can be rated once. If `customer_id` is given, it must be the
    /// customer the delivery was for.
    pub async fn rate(
        &self,
        delivery_id: i64,
        customer_id: Option<&str>,
        rating: i64,
        feedback: Option<String>,
    ) -> Result<Delivery, DeliveryError> {
        if !(1..=5).contains(&rating) {
            return Err(DeliveryError::Validation(format!("A rating must be between 1 and 5, not {rating}")));
        }
        let delivery = self.fetch_delivery(delivery_id).await?;
        if customer_id.is_some_and(|c| c != delivery.user_id) {
            return Err(DeliveryError::NotYourDelivery(delivery_id));
        }
        if delivery.rating.is_some() {
            return Err(DeliveryError::AlreadyRated(delivery_id));
        }
        if delivery.status != DeliveryStatus::Delivered {
            return Err(DeliveryError::NotRateable(delivery_id));
        }
        let feedback = feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
        match self.db.rate_delivery(delivery_id, rating, feedback).await? {
            Some(rated) => {
                debug!("🚚️ Delivery #{delivery_id} rated {rating}/5");
                Ok(rated)
            },
            // Someone rated it between the read and the write
            None => Err(DeliveryError::AlreadyRated(delivery_id)),
        }
    }

    /// Records what the courier earned for this delivery, and any tip.
    pub async fn record_earnings(
        &self,
        delivery_id: i64,
        courier_id: &str,
        earnings: Cents,
        tip: Cents,
    ) -> Result<Delivery, DeliveryError> {
        if earnings.is_negative() || tip.is_negative() {
            return Err(DeliveryError::Validation("Earnings and tips cannot be negative".into()));
        }
        let delivery = self.fetch_delivery(delivery_id).await?;
        if delivery.delivery_person_id.as_deref() != Some(courier_id) {
            return Err(DeliveryError::NotYourDelivery(delivery_id));
        }
        let updated =
            self.db.record_earnings(delivery_id, earnings, tip).await?.ok_or(DeliveryError::NotFound(delivery_id))?;
        debug!("🚚️ {courier_id} earned {earnings} (+{tip} tip) on delivery #{delivery_id}");
        Ok(updated)
    }

    pub async fn earnings(&self, courier_id: &str, period: EarningsPeriod) -> Result<EarningsSummary, DeliveryError> {
        self.earnings_at(courier_id, period, Utc::now()).await
    }

    /// Sums the courier's delivered deliveries since the start of `period`, as seen at `now`.
    pub async fn earnings_at(
        &self,
        courier_id: &str,
        period: EarningsPeriod,
        now: DateTime<Utc>,
    ) -> Result<EarningsSummary, DeliveryError> {
        let since = period.start(now);
        let delivered = self.db.delivered_since(courier_id, since).await?;
        Ok(EarningsSummary::from_deliveries(courier_id, period, since, &delivered))
    }

    pub async fn fetch_delivery(&self, delivery_id: i64) -> Result<Delivery, DeliveryError> {
        self.db.fetch_delivery(delivery_id).await?.ok_or(DeliveryError::NotFound(delivery_id))
    }

    pub async fn deliveries_for_order(&self, order_id: i64) -> Result<Vec<Delivery>, DeliveryError> {
        self.db.deliveries_for_order(order_id).await
    }

    pub async fn active_delivery_for_courier(&self, courier_id: &str) -> Result<Option<Delivery>, DeliveryError> {
        self.db.active_delivery_for_courier(courier_id).await
    }

    async fn call_status_changed_hook(&self, delivery: &Delivery, old_status: DeliveryStatus) {
        for emitter in &self.producers.delivery_status_producer {
            trace!("🚚️ Notifying delivery status hook subscribers");
            let event = DeliveryStatusChangedEvent::new(delivery.clone(), old_status);
            emitter.publish_event(event).await;
        }
    }
}
