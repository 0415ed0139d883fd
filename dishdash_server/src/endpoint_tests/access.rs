use actix_web::{
    http::{header::AUTHORIZATION, StatusCode},
    test::TestRequest,
};
use chrono::Duration;
use dishdash_engine::db_types::Role;
use serde_json::Value;

use super::helpers::*;
use crate::{
    auth::{JwtClaims, TokenIssuer},
    config::AuthConfig,
};

#[actix_web::test]
async fn no_token() {
    let ctx = test_context().await;
    let (status, body) = call(&ctx, TestRequest::get().uri("/api/orders")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = json(&body);
    assert!(body["error"].as_str().unwrap().contains("token"));
}

#[actix_web::test]
async fn not_a_bearer_token() {
    let ctx = test_context().await;
    let token = issue_token(ALICE, Role::Customer);
    let req = TestRequest::get().uri("/api/orders").insert_header((AUTHORIZATION, token));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn forged_token() {
    let ctx = test_context().await;
    let forged = TokenIssuer::new(&AuthConfig::new("not-the-server-secret-at-all-0000000000"))
        .issue_token(JwtClaims::new(ADMIN, Role::Admin), None)
        .unwrap();
    let req = TestRequest::get().uri("/api/orders").insert_header((AUTHORIZATION, format!("Bearer {forged}")));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn expired_token() {
    let ctx = test_context().await;
    let expired = TokenIssuer::new(&AuthConfig::new(TEST_JWT_SECRET))
        .issue_token(JwtClaims::new(ALICE, Role::Customer), Some(Duration::hours(-1)))
        .unwrap();
    let req = TestRequest::get().uri("/api/orders").insert_header((AUTHORIZATION, format!("Bearer {expired}")));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_role_is_forbidden() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    // Couriers cannot place orders
    let req = TestRequest::post().uri("/api/orders").insert_header(bearer(COURIER, Role::DeliveryPerson)).set_json(pizza_request());
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body: Value = json(&body);
    assert!(body["error"].as_str().unwrap().contains("customer"));
    // Restaurants cannot delete orders
    let req = TestRequest::delete().uri("/api/orders/1").insert_header(bearer(CHEF, Role::RestaurantAdmin));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // Customers cannot assign deliveries
    let req = TestRequest::post()
        .uri("/api/delivery/assign")
        .insert_header(bearer(ALICE, Role::Customer))
        .set_json(serde_json::json!({"order_id": 1, "user_id": ALICE, "delivery_address": ALICE_ADDRESS}));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn service_tokens_can_push_profiles() {
    let ctx = test_context().await;
    let issuer = TokenIssuer::new(&AuthConfig::new(TEST_JWT_SECRET));
    let token = issuer.issue_service_token("user-service").unwrap();
    let req = TestRequest::put()
        .uri("/api/profiles/dave")
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .set_json(serde_json::json!({"role": "customer", "email": "dave@example.com", "address": " 9 Elm St "}));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = json(&body);
    assert_eq!(body["user_id"], "dave");
    assert_eq!(body["email"], "dave@example.com");

    // Ids that read as room names are refused
    for reserved in ["broadcast", "order_12"] {
        let req = TestRequest::put()
            .uri(&format!("/api/profiles/{reserved}"))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(serde_json::json!({"role": "customer"}));
        let (status, body) = call(&ctx, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    // Customers may not edit profiles
    let req = TestRequest::put()
        .uri("/api/profiles/dave")
        .insert_header(bearer("dave", Role::Customer))
        .set_json(serde_json::json!({"role": "admin"}));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_bodies_are_bad_requests() {
    let ctx = test_context().await;
    let req = TestRequest::post()
        .uri("/api/orders")
        .insert_header(bearer(ALICE, Role::Customer))
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"restaurant_id\": 42");
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = json(&body);
    assert!(body["error"].is_string());

    let req = TestRequest::get().uri("/api/orders/not-a-number").insert_header(bearer(ALICE, Role::Customer));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
