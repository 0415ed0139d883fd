use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        Delivery,
        DeliveryStatus,
        NewOrder,
        NewOutboxEntry,
        NotificationChannel,
        Order,
        OrderStatusType,
        OutboxEntry,
        PaymentStatus,
        SideEffect,
    },
    dd_api::{
        order_objects::{status_message, OrderFlowConfig},
        outbox::OutboxDispatcher,
    },
    events::{EventProducers, OrderStatusChangedEvent},
    realtime::{BusEvent, Room, StatusBus},
    traits::{
        DeliveryManagement,
        NotificationManagement,
        OrderFlowError,
        OrderManagement,
        OrderQueryFilter,
        OutboxError,
        OutboxManagement,
        ProfileManagement,
    },
};

/// `OrderFlowApi` is the order orchestrator. It owns the order record and its state machine, and drives every other
/// service off the back of order status changes.
///
/// A status change goes through these steps, in order:
/// 1. The transition is validated against the state machine.
/// 2. The new status and the side effects it implies are committed atomically. The write is a compare-and-swap on
///    the order's version, so of two concurrent changes only one can win.
/// 3. An `orderStatusUpdate` is published to the order's room, and the `on_order_status_changed` hook fires.
/// 4. The side effects (delivery assignment on `Confirmed`, email and SMS to the customer) are performed one after
///    the other, each under a timeout.
///
/// Side-effect failures never reach the caller. The status change stands, the failure is logged, and the outbox
/// retries it later.
pub struct OrderFlowApi<B> {
    db: B,
    bus: StatusBus,
    producers: EventProducers,
    dispatcher: OutboxDispatcher<B>,
    config: OrderFlowConfig,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({:?})", self.config)
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(
        db: B,
        bus: StatusBus,
        producers: EventProducers,
        dispatcher: OutboxDispatcher<B>,
        config: OrderFlowConfig,
    ) -> Self {
        Self { db, bus, producers, dispatcher, config }
    }

    pub fn dispatcher(&self) -> &OutboxDispatcher<B> {
        &self.dispatcher
    }

    pub fn config(&self) -> &OrderFlowConfig {
        &self.config
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement
{
    /// Places a new order in the `Pending` state. The total is calculated here; clients never supply it.
    ///
    /// The customer is sent an email confirming the order, and the order's room is told about it.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        validate_new_order(&order)?;
        let total = order
            .total_amount()
            .filter(|t| !t.is_negative())
            .ok_or_else(|| OrderFlowError::Validation("The order total is too large".into()))?;
        let (order, entries) = self
            .db
            .insert_order(order, total, |o| {
                let effect = SideEffect::Notify {
                    user_id: o.customer_id.clone(),
                    channel: NotificationChannel::Email,
                    order_id: o.id,
                    content: status_message(o, OrderStatusType::Pending),
                };
                vec![NewOutboxEntry::for_transition(o.id, OrderStatusType::Pending, effect)]
            })
            .await?;
        info!("🔄️📦️ Order #{} placed by {} for {}", order.id, order.customer_id, order.total_amount);
        self.bus.publish(&Room::order(order.id), BusEvent::order_status(order.id, order.status, order.updated_at));
        self.run_side_effects(order.id, entries).await;
        Ok(order)
    }

    /// Moves an order to `new_status` and performs the side effects of the move.
    ///
    /// Errors only concern the order itself: it does not exist, the move is not allowed, or someone else changed the
    /// order first.
    pub async fn transition(&self, order_id: i64, new_status: OrderStatusType) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            debug!("🔄️ Order #{order_id} cannot move from {old_status} to {new_status}");
            return Err(OrderFlowError::InvalidTransition { from: old_status, to: new_status });
        }
        if new_status == OrderStatusType::Confirmed &&
            self.config.require_payment_before_confirm &&
            order.payment_status != PaymentStatus::Completed
        {
            return Err(OrderFlowError::PaymentNotCompleted(order_id));
        }
        let effects = side_effects_for(&order, new_status);
        let (updated, entries) = self.db.update_order_status(order_id, order.version, new_status, effects).await?;
        info!("🔄️ Order #{order_id} moved from {old_status} to {new_status}");
        self.bus.publish(&Room::order(order_id), BusEvent::order_status(order_id, updated.status, updated.updated_at));
        self.call_status_changed_hook(&updated, old_status).await;
        self.run_side_effects(order_id, entries).await;
        Ok(updated)
    }

    async fn run_side_effects(&self, order_id: i64, entries: Vec<OutboxEntry>) {
        if entries.is_empty() {
            return;
        }
        let summary = self.dispatcher.dispatch(entries).await;
        if summary.failed > 0 {
            warn!(
                "🔄️ {} of {} side effects for order #{order_id} failed. They will be retried.",
                summary.failed,
                summary.failed + summary.dispatched + summary.skipped
            );
        }
    }

    /// Mirrors a payment's status onto its order.
    ///
    /// If auto-confirmation is enabled and the payment completed, a `Pending` order is confirmed. Returns `None` if
    /// the order does not exist.
    pub async fn record_payment_status(
        &self,
        order_id: i64,
        status: PaymentStatus,
    ) -> Result<Option<Order>, OrderFlowError> {
        let Some(order) = self.db.set_payment_status(order_id, status).await? else {
            warn!("🔄️💳️ A payment for order #{order_id} changed, but there is no such order");
            return Ok(None);
        };
        debug!("🔄️💳️ Order #{order_id} payment is now {status}");
        if status == PaymentStatus::Completed &&
            self.config.auto_confirm_on_payment &&
            order.status == OrderStatusType::Pending
        {
            match self.transition(order_id, OrderStatusType::Confirmed).await {
                Ok(confirmed) => {
                    info!("🔄️💳️ Order #{order_id} confirmed automatically on payment");
                    return Ok(Some(confirmed));
                },
                Err(OrderFlowError::Conflict(_) | OrderFlowError::InvalidTransition { .. }) => {
                    debug!("🔄️💳️ Order #{order_id} moved on before it could be confirmed automatically");
                },
                Err(e) => return Err(e),
            }
        }
        Ok(Some(order))
    }

    /// Brings the order in line with its delivery: a delivery that is under way puts a `Ready` order into
    /// `Delivering`, and a delivered delivery completes a `Delivering` order. Returns the order if it changed.
    pub async fn sync_with_delivery(&self, delivery: &Delivery) -> Result<Option<Order>, OrderFlowError> {
        let (from, to) = match delivery.status {
            DeliveryStatus::Delivering => (OrderStatusType::Ready, OrderStatusType::Delivering),
            DeliveryStatus::Delivered => (OrderStatusType::Delivering, OrderStatusType::Delivered),
            _ => return Ok(None),
        };
        let order = self.fetch_order(delivery.order_id).await?;
        if order.status != from {
            trace!("🔄️🚚️ Order #{} is {}; delivery #{} does not move it", order.id, order.status, delivery.id);
            return Ok(None);
        }
        self.transition(order.id, to).await.map(Some)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or(OrderFlowError::OrderNotFound(order_id))
    }

    pub async fn orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(OrderQueryFilter::default().with_customer_id(customer_id)).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        self.db.search_orders(query).await
    }

    /// Hard-deletes an order. Side effects that were never dispatched are dropped with it.
    pub async fn delete_order(&self, order_id: i64) -> Result<(), OrderFlowError> {
        if self.db.delete_order(order_id).await? {
            info!("🔄️ Order #{order_id} has been deleted");
            Ok(())
        } else {
            Err(OrderFlowError::OrderNotFound(order_id))
        }
    }

    /// Every side effect recorded for the order, with its dispatch state.
    pub async fn side_effects_for_order(&self, order_id: i64) -> Result<Vec<OutboxEntry>, OutboxError> {
        self.db.outbox_entries_for_order(order_id).await
    }

    async fn call_status_changed_hook(&self, order: &Order, old_status: OrderStatusType) {
        for emitter in &self.producers.order_status_producer {
            trace!("🔄️ Notifying order status hook subscribers");
            emitter.publish_event(OrderStatusChangedEvent::new(order.clone(), old_status)).await;
        }
    }
}

/// The side effects of `order` moving to `target`. Delivery assignment comes first.
fn side_effects_for(order: &Order, target: OrderStatusType) -> Vec<NewOutboxEntry> {
    let mut effects = Vec::with_capacity(3);
    if target == OrderStatusType::Confirmed {
        let effect = SideEffect::AssignDelivery { order_id: order.id, customer_id: order.customer_id.clone() };
        effects.push(NewOutboxEntry::for_transition(order.id, target, effect));
    }
    let content = status_message(order, target);
    for channel in [NotificationChannel::Email, NotificationChannel::Sms] {
        let effect = SideEffect::Notify {
            user_id: order.customer_id.clone(),
            channel,
            order_id: order.id,
            content: content.clone(),
        };
        effects.push(NewOutboxEntry::for_transition(order.id, target, effect));
    }
    effects
}

fn validate_new_order(order: &NewOrder) -> Result<(), OrderFlowError> {
    if order.customer_id.trim().is_empty() {
        return Err(OrderFlowError::Validation("The customer id cannot be empty".into()));
    }
    if order.restaurant_id.trim().is_empty() {
        return Err(OrderFlowError::Validation("The restaurant id cannot be empty".into()));
    }
    if order.items.is_empty() {
        return Err(OrderFlowError::Validation("An order must contain at least one item".into()));
    }
    for item in &order.items {
        if item.name.trim().is_empty() {
            return Err(OrderFlowError::Validation("Every item must have a name".into()));
        }
        if item.quantity <= 0 {
            return Err(OrderFlowError::Validation(format!("{} has a quantity of {}", item.name, item.quantity)));
        }
        if item.unit_price.is_negative() {
            return Err(OrderFlowError::Validation(format!("{} has a negative price", item.name)));
        }
    }
    Ok(())
}
