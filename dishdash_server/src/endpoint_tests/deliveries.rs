use actix_web::{http::StatusCode, test::TestRequest};
use dishdash_engine::{
    db_types::{Delivery, DeliveryStatus, NewOrder, OrderStatusType, Role},
    dd_api::delivery_objects::EarningsSummary,
};
use serde_json::json;

use super::helpers::*;
use crate::server::ServerContext;

/// Places and confirms an order for Alice, which hands a delivery to the seeded courier.
async fn confirmed_delivery(ctx: &ServerContext) -> Delivery {
    let request = pizza_request();
    let order = ctx.order_flow_api().create_order(NewOrder::new(ALICE, request.restaurant_id, request.items)).await.unwrap();
    ctx.order_flow_api().transition(order.id, OrderStatusType::Confirmed).await.unwrap();
    ctx.delivery_api().deliveries_for_order(order.id).await.unwrap().remove(0)
}

async fn set_status(ctx: &ServerContext, delivery_id: i64, user: &str, role: Role, status: DeliveryStatus) -> (StatusCode, String) {
    let req = TestRequest::put()
        .uri(&format!("/api/delivery/status/{delivery_id}"))
        .insert_header(bearer(user, role))
        .set_json(json!({ "status": status }));
    call(ctx, req).await
}

#[actix_web::test]
async fn assign_a_delivery() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let req = TestRequest::post().uri("/api/delivery/assign").insert_header(bearer(ADMIN, Role::Admin)).set_json(json!({
        "order_id": 41,
        "user_id": ALICE,
        "delivery_address": ALICE_ADDRESS,
    }));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let delivery: Delivery = json(&body);
    assert_eq!(delivery.status, DeliveryStatus::Assigned);
    assert_eq!(delivery.delivery_person_id.as_deref(), Some(COURIER));
    assert_eq!(delivery.delivery_fee, ctx.config.default_delivery_fee);

    // The only courier is now busy
    let req = TestRequest::post().uri("/api/delivery/assign").insert_header(bearer(ADMIN, Role::Admin)).set_json(json!({
        "order_id": 42,
        "user_id": ALICE,
        "delivery_address": ALICE_ADDRESS,
        "delivery_fee": 250,
    }));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let unassigned: Delivery = json(&body);
    assert_eq!(unassigned.status, DeliveryStatus::Unassigned);
    assert_eq!(unassigned.delivery_fee.value(), 250);

    let req = TestRequest::post()
        .uri(&format!("/api/delivery/courier/{}", unassigned.id))
        .insert_header(bearer(ADMIN, Role::Admin))
        .set_json(json!({ "courier_id": "courier-dan" }));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let assigned: Delivery = json(&body);
    assert_eq!(assigned.status, DeliveryStatus::Assigned);
    assert_eq!(assigned.delivery_person_id.as_deref(), Some("courier-dan"));

    let (status, body) =
        call(&ctx, TestRequest::get().uri(&format!("/api/delivery/{}", assigned.id)).insert_header(bearer(ALICE, Role::Customer)))
            .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<Delivery>(&body), assigned);
}

#[actix_web::test]
async fn assign_needs_an_address() {
    let ctx = test_context().await;
    let req = TestRequest::post().uri("/api/delivery/assign").insert_header(bearer(ADMIN, Role::Admin)).set_json(json!({
        "order_id": 1,
        "user_id": ALICE,
        "delivery_address": "  ",
    }));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn only_the_assigned_courier_moves_a_delivery() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let delivery = confirmed_delivery(&ctx).await;

    let (status, _) = set_status(&ctx, delivery.id, "courier-dan", Role::DeliveryPerson, DeliveryStatus::PickedUp).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, DeliveryStatus::PickedUp).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json::<Delivery>(&body).status, DeliveryStatus::PickedUp);

    // No skipping ahead, and no going back
    let (status, _) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, DeliveryStatus::Delivered).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, DeliveryStatus::Assigned).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Admins may move any delivery
    let (status, _) = set_status(&ctx, delivery.id, ADMIN, Role::Admin, DeliveryStatus::Delivering).await;
    assert_eq!(status, StatusCode::OK);

    // Customers may not
    let (status, _) = set_status(&ctx, delivery.id, ALICE, Role::Customer, DeliveryStatus::Delivered).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn rate_a_delivery() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let delivery = confirmed_delivery(&ctx).await;
    let rate = |user: &str, rating: i64| {
        TestRequest::post()
            .uri(&format!("/api/delivery/rate/{}", delivery.id))
            .insert_header(bearer(user, Role::Customer))
            .set_json(json!({ "rating": rating, "feedback": "Still warm" }))
    };

    // Not delivered yet
    let (status, _) = call(&ctx, rate(ALICE, 5)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for next in [DeliveryStatus::PickedUp, DeliveryStatus::Delivering, DeliveryStatus::Delivered] {
        let (status, body) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, next).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, _) = call(&ctx, rate(ALICE, 6)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&ctx, rate(BOB, 4)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&ctx, rate(ALICE, 5)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rated: Delivery = json(&body);
    assert_eq!(rated.rating, Some(5));
    assert_eq!(rated.feedback.as_deref(), Some("Still warm"));

    let (status, _) = call(&ctx, rate(ALICE, 1)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn courier_earnings() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let delivery = confirmed_delivery(&ctx).await;
    for next in [DeliveryStatus::PickedUp, DeliveryStatus::Delivering, DeliveryStatus::Delivered] {
        let (status, _) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, next).await;
        assert_eq!(status, StatusCode::OK);
    }
    let req = TestRequest::post()
        .uri(&format!("/api/delivery/earnings/{}", delivery.id))
        .insert_header(bearer(COURIER, Role::DeliveryPerson))
        .set_json(json!({ "earnings": 600, "tip": 150 }));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let req = TestRequest::post()
        .uri(&format!("/api/delivery/earnings/{}", delivery.id))
        .insert_header(bearer("courier-dan", Role::DeliveryPerson))
        .set_json(json!({ "earnings": 600 }));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::get().uri("/api/delivery/earnings").insert_header(bearer(COURIER, Role::DeliveryPerson));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let summary: EarningsSummary = json(&body);
    assert_eq!(summary.courier_id, COURIER);
    assert_eq!(summary.deliveries, 1);
    assert_eq!(summary.total_earnings.value(), 600);
    assert_eq!(summary.total_tips.value(), 150);
    assert_eq!(summary.total.value(), 750);

    let req = TestRequest::get().uri("/api/delivery/earnings?period=month").insert_header(bearer(COURIER, Role::DeliveryPerson));
    let (status, body) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json::<EarningsSummary>(&body).deliveries, 1);

    let req = TestRequest::get().uri("/api/delivery/earnings?period=decade").insert_header(bearer(COURIER, Role::DeliveryPerson));
    let (status, _) = call(&ctx, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn delivery_drives_the_order_when_synced() {
    let mut config = test_config();
    config.sync_order_with_delivery = true;
    let ctx = context_with(
        std::sync::Arc::new(dishdash_engine::notify::LogTransport),
        std::sync::Arc::new(super::mocks::MockGateway::new()),
        config,
    )
    .await;
    let handlers = dishdash_engine::events::EventHandlers::new(8, crate::server::create_hooks(&ctx));
    let ctx = ctx.with_producers(handlers.producers());
    handlers.start_handlers().await;
    seed_users(&ctx).await;
    let delivery = confirmed_delivery(&ctx).await;
    let api = ctx.order_flow_api();
    api.transition(delivery.order_id, OrderStatusType::Preparing).await.unwrap();
    api.transition(delivery.order_id, OrderStatusType::Ready).await.unwrap();
    for next in [DeliveryStatus::PickedUp, DeliveryStatus::Delivering] {
        let (status, _) = set_status(&ctx, delivery.id, COURIER, Role::DeliveryPerson, next).await;
        assert_eq!(status, StatusCode::OK);
    }
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    let order = api.fetch_order(delivery.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Delivering);
}
