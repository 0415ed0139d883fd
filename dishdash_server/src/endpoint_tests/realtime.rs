use std::time::Duration;

use actix_web::{
    body::MessageBody,
    dev::Service,
    http::{header::CONTENT_TYPE, StatusCode},
    test,
    test::TestRequest,
    App,
};
use chrono::Utc;
use dishdash_engine::{
    db_types::{LocationRecord, NewOrder, Order, OrderStatusType, Role},
    realtime::{BusEvent, Room},
};
use serde_json::json;

use super::helpers::*;
use crate::server::{configure_app, ServerContext};

async fn alices_order(ctx: &ServerContext) -> Order {
    let request = pizza_request();
    ctx.order_flow_api().create_order(NewOrder::new(ALICE, request.restaurant_id, request.items)).await.unwrap()
}

/// Waits for the next frame of an event stream.
async fn next_frame<B: MessageBody>(body: &mut std::pin::Pin<Box<B>>) -> String
where B::Error: std::fmt::Debug {
    let chunk = tokio::time::timeout(Duration::from_secs(2), futures::future::poll_fn(|cx| body.as_mut().poll_next(cx)))
        .await
        .expect("Timed out waiting for an event")
        .expect("The event stream ended")
        .expect("The event stream failed");
    String::from_utf8_lossy(&chunk).into_owned()
}

#[actix_web::test]
async fn stream_an_order_room() {
    let ctx = test_context().await;
    let order = alices_order(&ctx).await;
    let app = test::init_service(App::new().configure(configure_app(ctx.clone()))).await;
    let room = format!("/api/events/order_{}", order.id);
    let req = TestRequest::get().uri(&room).insert_header(bearer(ALICE, Role::Customer)).to_request();
    let res = app.call(req).await.expect("Request failed");
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(CONTENT_TYPE).unwrap(), "text/event-stream");
    let mut body = Box::pin(res.into_body());
    assert_eq!(next_frame(&mut body).await, format!(": joined order_{}\n\n", order.id));

    // Other rooms are not forwarded
    let other = order.id + 1;
    ctx.bus.publish(&Room::order(other), BusEvent::order_status(other, OrderStatusType::Ready, Utc::now()));
    ctx.bus.publish(&Room::order(order.id), BusEvent::order_status(order.id, OrderStatusType::Confirmed, Utc::now()));
    let frame = next_frame(&mut body).await;
    assert!(frame.starts_with("event: orderStatusUpdate\ndata: "), "{frame}");
    assert!(frame.contains(&format!(r#""orderId":{}"#, order.id)));
    assert!(frame.contains(r#""status":"Confirmed""#));
    assert!(frame.ends_with("\n\n"));
}

#[actix_web::test]
async fn order_rooms_are_for_the_customer_and_courier() {
    let ctx = test_context().await;
    seed_users(&ctx).await;
    let order = alices_order(&ctx).await;
    let app = test::init_service(App::new().configure(configure_app(ctx.clone()))).await;
    let listen = |order_id: i64, user: &str, role: Role| {
        TestRequest::get().uri(&format!("/api/events/order_{order_id}")).insert_header(bearer(user, role)).to_request()
    };

    let (status, _) = send(&app, listen(order.id, BOB, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, listen(order.id, COURIER, Role::DeliveryPerson)).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "No courier is on the order yet");
    let (status, _) = send(&app, listen(9999, ALICE, Role::Customer)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.order_flow_api().transition(order.id, OrderStatusType::Confirmed).await.unwrap();
    let res = app.call(listen(order.id, COURIER, Role::DeliveryPerson)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.call(listen(order.id, ALICE, Role::Customer)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.call(listen(order.id, CHEF, Role::RestaurantAdmin)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let (status, _) = send(&app, listen(order.id, BOB, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn user_rooms_are_private() {
    let ctx = test_context().await;
    let listen = |room: &str, user: &str, role: Role| {
        TestRequest::get().uri(&format!("/api/events/{room}")).insert_header(bearer(user, role)).to_request()
    };
    let app = test::init_service(App::new().configure(configure_app(ctx.clone()))).await;

    let (status, _) = send(&app, listen(BOB, ALICE, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, listen("order_seven", ALICE, Role::Customer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let res = app.call(listen(ALICE, ALICE, Role::Customer)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.call(listen(BOB, ADMIN, Role::Admin)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/api/events/broadcast").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn courier_locations() {
    let ctx = test_context().await;
    let app = test::init_service(App::new().configure(configure_app(ctx.clone()))).await;
    let req = TestRequest::get().uri("/api/events/broadcast").insert_header(bearer(ALICE, Role::Customer)).to_request();
    let res = app.call(req).await.unwrap();
    let mut body = Box::pin(res.into_body());
    assert_eq!(next_frame(&mut body).await, ": joined broadcast\n\n");

    let report = |lat: f64, lon: f64| {
        TestRequest::post()
            .uri("/api/location")
            .insert_header(bearer(COURIER, Role::DeliveryPerson))
            .set_json(json!({ "latitude": lat, "longitude": lon }))
            .to_request()
    };
    let (status, body_text) = send(&app, report(51.5072, -0.1276)).await;
    assert_eq!(status, StatusCode::OK, "{body_text}");
    let record: LocationRecord = json(&body_text);
    assert_eq!(record.agent_id, COURIER);

    let frame = next_frame(&mut body).await;
    assert!(frame.starts_with("event: deliveryLocationUpdate\n"), "{frame}");
    assert!(frame.contains(&format!(r#""agentId":"{COURIER}""#)));

    let (status, _) = send(&app, report(91.0, 0.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = TestRequest::get().uri(&format!("/api/location/{COURIER}")).insert_header(bearer(ALICE, Role::Customer));
    let (status, body_text) = send(&app, req.to_request()).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: LocationRecord = json(&body_text);
    assert_eq!(fetched.latitude, 51.5072);
    assert_eq!(fetched.longitude, -0.1276);

    let req = TestRequest::get().uri("/api/location/courier-nobody").insert_header(bearer(ALICE, Role::Customer));
    let (status, _) = send(&app, req.to_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri("/api/location")
        .insert_header(bearer(ALICE, Role::Customer))
        .set_json(json!({ "latitude": 1.0, "longitude": 1.0 }));
    let (status, _) = send(&app, req.to_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
