use std::{sync::Arc, time::Duration};

use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use dishdash_engine::{
    db_types::{NewOrder, Order, OrderStatusType, Payment, PaymentStatus, Role},
    dd_api::payment_objects::PaymentCreated,
    events::EventHandlers,
    gateway::{sign_webhook_payload, GatewayError, PaymentIntent},
    notify::LogTransport,
};
use serde_json::{json, Value};

use super::{helpers::*, mocks::MockGateway};
use crate::{
    config::ServerConfig,
    data_objects::WebhookAck,
    routes::WEBHOOK_SIGNATURE_HEADER,
    server::{create_hooks, ServerContext},
};

fn gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_create_intent().returning(|req| {
        Ok(PaymentIntent { id: format!("pi_order_{}", req.order_id), client_secret: format!("cs_{}", req.order_id) })
    });
    gateway
}

async fn payments_context(config: ServerConfig) -> ServerContext {
    context_with(Arc::new(LogTransport), Arc::new(gateway()), config).await
}

async fn alices_order(ctx: &ServerContext) -> Order {
    let request = pizza_request();
    ctx.order_flow_api().create_order(NewOrder::new(ALICE, request.restaurant_id, request.items)).await.unwrap()
}

fn pay(order: &Order, customer: &str) -> TestRequest {
    TestRequest::post().uri("/api/payments/create").insert_header(bearer(customer, Role::Customer)).set_json(json!({
        "order_id": order.id,
        "amount": order.total_amount,
        "payment_method": "card",
    }))
}

fn webhook(event_type: &str, intent_id: &str, secret: &str) -> TestRequest {
    let body = json!({
        "id": format!("evt_{intent_id}"),
        "type": event_type,
        "data": { "object": { "id": intent_id, "object": "payment_intent" } }
    })
    .to_string();
    let signature = sign_webhook_payload(secret, body.as_bytes(), Utc::now().timestamp());
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, signature))
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
}

#[actix_web::test]
async fn create_a_payment() {
    let ctx = payments_context(test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (status, body) = call(&ctx, pay(&order, ALICE)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let created: PaymentCreated = json(&body);
    assert_eq!(created.client_secret, format!("cs_{}", order.id));
    assert_eq!(created.payment.status, PaymentStatus::Pending);
    assert_eq!(created.payment.user_id, ALICE);
    assert_eq!(created.payment.external_intent_id, format!("pi_order_{}", order.id));
}

#[actix_web::test]
async fn customers_only_pay_for_their_own_orders() {
    let ctx = payments_context(test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (status, _) = call(&ctx, pay(&order, BOB)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut missing = order.clone();
    missing.id = 9999;
    let (status, _) = call(&ctx, pay(&missing, ALICE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn payment_processor_down() {
    let mut gateway = MockGateway::new();
    gateway.expect_create_intent().returning(|_| Err(GatewayError::Transport("connection refused".into())));
    let ctx = context_with(Arc::new(LogTransport), Arc::new(gateway), test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (status, _) = call(&ctx, pay(&order, ALICE)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(ctx.payment_api().payments_for_order(order.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn payment_visibility() {
    let ctx = payments_context(test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (status, _) = call(&ctx, pay(&order, ALICE)).await;
    assert_eq!(status, StatusCode::CREATED);
    let path = format!("/api/payments/order/{}", order.id);

    let (status, body) = call(&ctx, TestRequest::get().uri(&path).insert_header(bearer(ALICE, Role::Customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<Vec<Payment>>(&body).len(), 1);

    let (status, body) = call(&ctx, TestRequest::get().uri(&path).insert_header(bearer(BOB, Role::Customer))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<Vec<Payment>>(&body).is_empty());

    let (_, body) = call(&ctx, TestRequest::get().uri(&path).insert_header(bearer(ADMIN, Role::Admin))).await;
    assert_eq!(json::<Vec<Payment>>(&body).len(), 1);

    let (status, _) = call(&ctx, TestRequest::get().uri(&path).insert_header(bearer(COURIER, Role::DeliveryPerson))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn webhooks_complete_payments_once() {
    let ctx = payments_context(test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (_, body) = call(&ctx, pay(&order, ALICE)).await;
    let intent_id = json::<PaymentCreated>(&body).payment.external_intent_id;

    let (status, body) = call(&ctx, webhook("payment_intent.succeeded", &intent_id, TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ack: WebhookAck = json(&body);
    assert!(ack.received);
    assert!(ack.outcome.contains("completed"));

    // Replays and late failures are acknowledged, but change nothing
    let (status, body) = call(&ctx, webhook("payment_intent.succeeded", &intent_id, TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<WebhookAck>(&body).outcome.contains("already"));
    let (status, _) = call(&ctx, webhook("payment_intent.payment_failed", &intent_id, TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let payments = ctx.payment_api().payments_for_order(order.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Completed);
}

#[actix_web::test]
async fn webhooks_that_change_nothing_are_acknowledged() {
    let ctx = payments_context(test_config()).await;
    let (status, body) = call(&ctx, webhook("payment_intent.succeeded", "pi_nobody", TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<WebhookAck>(&body).outcome.contains("pi_nobody"));

    let (status, body) = call(&ctx, webhook("charge.refunded", "ch_1", TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json::<WebhookAck>(&body).outcome.contains("ignored"));
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let ctx = payments_context(test_config()).await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (_, body) = call(&ctx, pay(&order, ALICE)).await;
    let intent_id = json::<PaymentCreated>(&body).payment.external_intent_id;

    let (status, body) = call(&ctx, webhook("payment_intent.succeeded", &intent_id, "whsec_someone_else")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = json(&body);
    assert!(body["error"].as_str().unwrap().contains("Webhook rejected"));

    let req = TestRequest::post().uri("/payments/webhook").set_payload(r#"{"type":"payment_intent.succeeded"}"#);
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let payments = ctx.payment_api().payments_for_order(order.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn completed_payments_confirm_orders() {
    let mut config = test_config();
    config.auto_confirm_on_payment = true;
    let ctx = payments_context(config).await;
    let handlers = EventHandlers::new(8, create_hooks(&ctx));
    let ctx = ctx.with_producers(handlers.producers());
    handlers.start_handlers().await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let (_, body) = call(&ctx, pay(&order, ALICE)).await;
    let intent_id = json::<PaymentCreated>(&body).payment.external_intent_id;

    let (status, _) = call(&ctx, webhook("payment_intent.succeeded", &intent_id, TEST_WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(250)).await;
    let order = ctx.order_flow_api().fetch_order(order.id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.status, OrderStatusType::Confirmed);
}
