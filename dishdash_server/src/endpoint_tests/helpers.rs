use std::{sync::Arc, time::Duration};

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    App,
};
use dishdash_common::{Cents, Secret};
use dishdash_engine::{
    db_types::{OrderItem, Role, UserProfile},
    dd_api::order_objects::CreateOrderRequest,
    gateway::PaymentGateway,
    notify::{LogTransport, NotificationTransport},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::ProfileManagement,
};
use log::debug;

use super::mocks::MockGateway;
use crate::{
    auth::{JwtClaims, TokenIssuer},
    config::{AuthConfig, ServerConfig},
    server::{configure_app, ServerContext},
};

// DO NOT re-use these secrets anywhere.
pub const TEST_JWT_SECRET: &str = "dishdash-endpoint-tests-only-3f9a1c77e2b4";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_endpoint_tests_only";

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const COURIER: &str = "courier-carl";
pub const ADMIN: &str = "admin-ann";
pub const CHEF: &str = "chef-luigi";
pub const RESTAURANT: &str = "luigis";
pub const ALICE_ADDRESS: &str = "12 Harbour Road";

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.auth = AuthConfig::new(TEST_JWT_SECRET);
    config.payments.webhook_secret = Secret::new(TEST_WEBHOOK_SECRET.to_string());
    config.side_effect_timeout = Duration::from_millis(500);
    config
}

/// A fresh database with a log-only notification transport and a payment gateway that must not be called.
pub async fn test_context() -> ServerContext {
    context_with(Arc::new(LogTransport), Arc::new(MockGateway::new()), test_config()).await
}

pub async fn context_with(
    transport: Arc<dyn NotificationTransport>,
    gateway: Arc<dyn PaymentGateway>,
    config: ServerConfig,
) -> ServerContext {
    let db = prepare_test_env(&random_db_path()).await;
    ServerContext::new(db, transport, gateway, config)
}

/// Alice (a customer with an address on file) and an available courier.
pub async fn seed_users(ctx: &ServerContext) {
    let alice = UserProfile {
        user_id: ALICE.into(),
        role: Role::Customer,
        email: Some("alice@example.com".into()),
        phone: Some("+15550100".into()),
        available: false,
    };
    ctx.db.upsert_profile(alice).await.expect("Error creating alice");
    ctx.db.add_address(ALICE, ALICE_ADDRESS).await.expect("Error adding address");
    let courier = UserProfile { user_id: COURIER.into(), role: Role::DeliveryPerson, email: None, phone: None, available: true };
    ctx.db.upsert_profile(courier).await.expect("Error creating courier");
}

pub fn issue_token(user_id: &str, role: Role) -> String {
    let issuer = TokenIssuer::new(&AuthConfig::new(TEST_JWT_SECRET));
    issuer.issue_token(JwtClaims::new(user_id, role), None).expect("Failed to sign token")
}

pub fn bearer(user_id: &str, role: Role) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {}", issue_token(user_id, role)))
}

/// 2 × Margherita at $8.99 plus 1 × Soda at $2.99
pub fn pizza_request() -> CreateOrderRequest {
    CreateOrderRequest {
        restaurant_id: RESTAURANT.into(),
        items: vec![OrderItem::new("Margherita", 2, Cents::from(899)), OrderItem::new("Soda", 1, Cents::from(299))],
        customer_id: None,
    }
}

/// Sends the request to the service and returns the status and body. Errors raised by middleware are rendered the
/// same way the HTTP server would render them.
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, String)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
    B::Error: std::fmt::Debug,
{
    match app.call(req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            debug!("Request failed with {status}: {e}");
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

/// Builds the full application over `ctx` and sends a single request to it.
pub async fn call(ctx: &ServerContext, req: TestRequest) -> (StatusCode, String) {
    let app = test::init_service(App::new().configure(configure_app(ctx.clone()))).await;
    send(&app, req.to_request()).await
}

pub fn json<T: serde::de::DeserializeOwned>(body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Could not parse {body}: {e}"))
}
