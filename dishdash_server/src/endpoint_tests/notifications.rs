use std::sync::Arc;

use actix_web::{http::StatusCode, test::TestRequest};
use dishdash_engine::{
    db_types::{Notification, NotificationChannel, NotificationStatus, Role},
    notify::TransportError,
};
use serde_json::json;

use super::{
    helpers::*,
    mocks::{MockGateway, MockTransport},
};

fn notify(channel: &str, key: &str) -> TestRequest {
    TestRequest::post().uri("/api/notifications").insert_header(bearer("order-service", Role::Service)).set_json(json!({
        "user_id": ALICE,
        "type": channel,
        "content": "Your order is on its way",
        "order_id": 3,
        "idempotency_key": key,
    }))
}

#[actix_web::test]
async fn send_an_email_once() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(|channel, recipient, content| {
            *channel == NotificationChannel::Email &&
                recipient == "alice@example.com" &&
                content == "Your order is on its way"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let ctx = context_with(Arc::new(transport), Arc::new(MockGateway::new()), test_config()).await;
    seed_users(&ctx).await;

    let (status, body) = call(&ctx, notify("email", "order-3-shipped")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let sent: Notification = json(&body);
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.channel, NotificationChannel::Email);
    assert!(!sent.read);

    // The same key is not sent twice
    let (status, body) = call(&ctx, notify("email", "order-3-shipped")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<Notification>(&body).id, sent.id);
}

#[actix_web::test]
async fn failed_sends_are_recorded() {
    let mut transport = MockTransport::new();
    transport.expect_send().returning(|_, _, _| Err(TransportError::Unreachable("relay is down".into())));
    let ctx = context_with(Arc::new(transport), Arc::new(MockGateway::new()), test_config()).await;
    seed_users(&ctx).await;

    let (status, body) = call(&ctx, notify("sms", "order-3-sms")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let failed: Notification = json(&body);
    assert_eq!(failed.status, NotificationStatus::Failed);
    assert!(failed.error.unwrap().contains("relay is down"));
}

#[actix_web::test]
async fn notification_inbox() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let (status, body) = call(&ctx, notify("push", "order-3-push")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let pushed: Notification = json(&body);
    assert_eq!(pushed.status, NotificationStatus::Sent);

    let inbox = |user: &str| TestRequest::get().uri("/api/notifications").insert_header(bearer(user, Role::Customer));
    let (status, body) = call(&ctx, inbox(ALICE)).await;
    assert_eq!(status, StatusCode::OK);
    let mine: Vec<Notification> = json(&body);
    assert!(mine.iter().any(|n| n.id == pushed.id));
    let (_, body) = call(&ctx, inbox(BOB)).await;
    assert!(json::<Vec<Notification>>(&body).is_empty());

    let read = |user: &str| {
        TestRequest::put().uri(&format!("/api/notifications/{}/read", pushed.id)).insert_header(bearer(user, Role::Customer))
    };
    let (status, _) = call(&ctx, read(BOB)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call(&ctx, read(ALICE)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(json::<Notification>(&body).read);
}

#[actix_web::test]
async fn only_services_send_notifications() {
    let ctx = test_context().await;
    let req = TestRequest::post().uri("/api/notifications").insert_header(bearer(ALICE, Role::Customer)).set_json(json!({
        "user_id": BOB,
        "type": "push",
        "content": "Hello",
    }));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post().uri("/api/notifications").insert_header(bearer(ADMIN, Role::Admin)).set_json(json!({
        "user_id": BOB,
        "type": "push",
        "content": "   ",
    }));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
