use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewPayment, Payment},
    dd_api::payment_objects::{CreatePaymentRequest, PaymentConfig, PaymentCreated, WebhookEvent, WebhookOutcome},
    events::{EventProducers, PaymentUpdatedEvent},
    gateway::{verify_webhook_signature, IntentRequest, PaymentGateway},
    realtime::{BusEvent, Room, StatusBus},
    traits::{PaymentApiError, PaymentManagement},
};

/// Issues payment intents and reconciles the processor's webhooks against local payment records.
///
/// Reconciliation only ever updates the payment itself. Interested parties learn about the change from the
/// `paymentStatusUpdate` event on the order's room and from the `on_payment_updated` hook.
pub struct PaymentApi<B> {
    db: B,
    gateway: Arc<dyn PaymentGateway>,
    bus: StatusBus,
    producers: EventProducers,
    config: PaymentConfig,
}

impl<B> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi ({})", self.config.currency)
    }
}

impl<B> PaymentApi<B> {
    pub fn new(
        db: B,
        gateway: Arc<dyn PaymentGateway>,
        bus: StatusBus,
        producers: EventProducers,
        config: PaymentConfig,
    ) -> Self {
        Self { db, gateway, bus, producers, config }
    }
}

impl<B> PaymentApi<B>
where B: PaymentManagement
{
    /// Asks the processor for a payment intent and records a `pending` payment against it.
    ///
    /// The returned client secret lets the customer's client complete the payment with the processor.
    pub async fn create_payment(
        &self,
        user_id: &str,
        request: CreatePaymentRequest,
    ) -> Result<PaymentCreated, PaymentApiError> {
        if !request.amount.is_positive() {
            return Err(PaymentApiError::Validation(format!("{} is not a valid payment amount", request.amount)));
        }
        if user_id.trim().is_empty() {
            return Err(PaymentApiError::Validation("The paying user id cannot be empty".into()));
        }
        let intent_request = IntentRequest {
            amount_minor: request.amount.value(),
            currency: self.config.currency.clone(),
            order_id: request.order_id,
        };
        let intent = self.gateway.create_intent(intent_request).await.map_err(|e| {
            warn!("💳️ Could not create a payment intent for order #{}: {e}", request.order_id);
            PaymentApiError::Gateway(e.to_string())
        })?;
        let payment = NewPayment {
            order_id: request.order_id,
            user_id: user_id.to_string(),
            amount: request.amount,
            payment_method: request.payment_method,
            external_intent_id: intent.id,
        };
        let payment = self.db.insert_payment(payment).await?;
        info!("💳️ Payment #{} of {} created for order #{}", payment.id, payment.amount, payment.order_id);
        Ok(PaymentCreated { payment, client_secret: intent.client_secret })
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookOutcome, PaymentApiError> {
        self.handle_webhook_at(payload, signature, Utc::now()).await
    }

    /// Verifies and applies a webhook as if it arrived at `now`.
    ///
    /// Nothing is read or written unless the signature is valid. Replays are harmless: a payment that already has
    /// the event's status is left alone, and a completed payment is never changed again.
    pub async fn handle_webhook_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, PaymentApiError> {
        verify_webhook_signature(
            self.config.webhook_secret.reveal(),
            payload,
            signature,
            self.config.webhook_tolerance_secs,
            now,
        )
        .map_err(|e| {
            warn!("💳️ Rejected a webhook: {e}");
            PaymentApiError::WebhookSignature(e.to_string())
        })?;
        let event: WebhookEvent =
            serde_json::from_slice(payload).map_err(|e| PaymentApiError::MalformedEvent(e.to_string()))?;
        let Some(status) = event.target_status() else {
            debug!("💳️ Ignoring {} webhook", event.event_type);
            return Ok(WebhookOutcome::Ignored(event.event_type));
        };
        let intent_id = event.intent_id();
        match self.db.update_payment_status(intent_id, status).await? {
            Some(payment) => {
                info!("💳️ Payment #{} for order #{} is now {}", payment.id, payment.order_id, payment.status);
                self.bus.publish(&Room::order(payment.order_id), BusEvent::payment_status(payment.order_id, payment.status));
                self.call_payment_updated_hook(&payment).await;
                Ok(WebhookOutcome::Updated(payment))
            },
            None => match self.db.payment_by_intent(intent_id).await? {
                Some(payment) => {
                    debug!("💳️ Webhook for {intent_id} changes nothing. Payment #{} stays {}", payment.id, payment.status);
                    Ok(WebhookOutcome::Unchanged(payment))
                },
                None => {
                    warn!("💳️ Received a {} webhook for unknown intent {intent_id}", event.event_type);
                    Ok(WebhookOutcome::UnknownIntent(intent_id.to_string()))
                },
            },
        }
    }

    pub async fn payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PaymentApiError> {
        self.db.payments_for_order(order_id).await
    }

    async fn call_payment_updated_hook(&self, payment: &Payment) {
        for emitter in &self.producers.payment_updated_producer {
            trace!("💳️ Notifying payment updated hook subscribers");
            emitter.publish_event(PaymentUpdatedEvent::new(payment.clone())).await;
        }
    }
}
