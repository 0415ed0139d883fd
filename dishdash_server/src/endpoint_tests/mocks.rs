use async_trait::async_trait;
use dishdash_engine::{
    db_types::NotificationChannel,
    gateway::{GatewayError, IntentRequest, PaymentGateway, PaymentIntent},
    notify::{NotificationTransport, TransportError},
};
use mockall::mock;

mock! {
    pub Gateway {}
    #[async_trait]
    impl PaymentGateway for Gateway {
        async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError>;
    }
}

mock! {
    pub Transport {}
    #[async_trait]
    impl NotificationTransport for Transport {
        async fn send(&self, channel: NotificationChannel, recipient: &str, content: &str) -> Result<(), TransportError>;
    }
}
