use std::time::Duration;

use async_trait::async_trait;
use dishdash_common::Secret;
use log::*;
use serde::Deserialize;

use crate::gateway::{GatewayError, IntentRequest, PaymentGateway, PaymentIntent};

/// Creates payment intents over the processor's REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

impl HttpPaymentGateway {
    pub fn new<S: Into<String>>(base_url: S, api_key: Secret<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client =
            reqwest::Client::builder().timeout(timeout).build().map_err(|e| GatewayError::Transport(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.base_url)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let form = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("metadata[order_id]", request.order_id.to_string()),
        ];
        trace!("💳️ Requesting a payment intent of {} {} for order #{}", request.amount_minor, request.currency, request.order_id);
        let response = self
            .client
            .post(self.intents_url())
            .bearer_auth(self.api_key.reveal())
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("💳️ Payment processor rejected the intent request for order #{}: {status}", request.order_id);
            return Err(GatewayError::Rejected { status: status.as_u16(), message });
        }
        let intent =
            response.json::<IntentResponse>().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        debug!("💳️ Payment intent {} created for order #{}", intent.id, request.order_id);
        Ok(PaymentIntent { id: intent.id, client_secret: intent.client_secret })
    }
}
