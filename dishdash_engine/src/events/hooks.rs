use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DeliveryStatusChangedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderStatusChangedEvent,
    PaymentUpdatedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub payment_updated_producer: Vec<EventProducer<PaymentUpdatedEvent>>,
    pub delivery_status_producer: Vec<EventProducer<DeliveryStatusChangedEvent>>,
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_payment_updated: Option<EventHandler<PaymentUpdatedEvent>>,
    pub on_delivery_status_changed: Option<EventHandler<DeliveryStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_status_changed = hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_updated = hooks.on_payment_updated.map(|f| EventHandler::new(buffer_size, f));
        let on_delivery_status_changed = hooks.on_delivery_status_changed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_status_changed, on_payment_updated, on_delivery_status_changed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_updated {
            result.payment_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_delivery_status_changed {
            result.delivery_status_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_updated {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_delivery_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_payment_updated: Option<Handler<PaymentUpdatedEvent>>,
    pub on_delivery_status_changed: Option<Handler<DeliveryStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentUpdatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_updated = Some(Arc::new(f));
        self
    }

    pub fn on_delivery_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeliveryStatusChangedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_delivery_status_changed = Some(Arc::new(f));
        self
    }
}
