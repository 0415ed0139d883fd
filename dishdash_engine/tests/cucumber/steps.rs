use std::{str::FromStr, time::Duration};

use chrono::Utc;
use cucumber::{given, then, when};
use dishdash_common::Cents;
use dishdash_engine::db_types::{DeliveryStatus, NewOrder, NotificationChannel, NotificationStatus, OrderItem, OrderStatusType};

use crate::cucumber::DishDashWorld;

#[given(expr = "a basket with {int} {word} at {int} cents each")]
async fn add_to_basket(world: &mut DishDashWorld, quantity: i64, name: String, price: i64) {
    world.basket.push(OrderItem::new(name, quantity, Cents::from(price)));
}

#[when(expr = "'{word}' places the order")]
async fn place_order(world: &mut DishDashWorld, customer_id: String) {
    let items = std::mem::take(&mut world.basket);
    let order = NewOrder::new(customer_id, "mario-pizza", items);
    let order = world.system().orders.create_order(order).await.expect("Error placing order");
    world.order = Some(order);
}

#[when(expr = "the order moves to {word}")]
async fn move_order(world: &mut DishDashWorld, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let id = world.order_id();
    let result = world.system().orders.transition(id, status).await;
    match result {
        Ok(order) => {
            world.order = Some(order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "the courier moves the delivery to {word}")]
async fn move_delivery(world: &mut DishDashWorld, status: String) {
    let status = DeliveryStatus::from_str(&status).expect("Not a valid delivery status");
    let id = world.order_id();
    let system = world.system();
    let delivery = system.deliveries.deliveries_for_order(id).await.expect("Error fetching deliveries").remove(0);
    let courier = delivery.delivery_person_id.clone().expect("The delivery has no courier");
    let updated = system
        .deliveries
        .update_status_for_courier(delivery.id, &courier, status)
        .await
        .expect("Error updating delivery");
    system.orders.sync_with_delivery(&updated).await.expect("Error syncing order with its delivery");
}

#[when("the notification relay is down")]
async fn relay_down(world: &mut DishDashWorld) {
    world.system().transport.set_failing(true);
}

#[when("the notification relay is back up")]
async fn relay_up(world: &mut DishDashWorld) {
    world.system().transport.set_failing(false);
}

#[when(expr = "the outbox is swept {int} minutes from now")]
async fn sweep_outbox(world: &mut DishDashWorld, minutes: i64) {
    let at = Utc::now() + chrono::Duration::minutes(minutes);
    world.system().orders.dispatcher().dispatch_due_at(at).await.expect("Error sweeping the outbox");
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut DishDashWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "the order total is {int} cents")]
async fn check_total(world: &mut DishDashWorld, total: i64) {
    let order = world.system().orders.fetch_order(world.order_id()).await.expect("Error fetching order");
    assert_eq!(order.total_amount, Cents::from(total), "Order total is incorrect");
}

#[then(expr = "the order status is {word}")]
async fn check_status(world: &mut DishDashWorld, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.system().orders.fetch_order(world.order_id()).await.expect("Error fetching order");
    assert_eq!(order.status, status, "Order status is incorrect");
}

#[then("the last transition fails")]
async fn check_failed(world: &mut DishDashWorld) {
    assert!(world.last_error.is_some(), "The last transition succeeded");
}

#[then(expr = "the order has {int} delivery/deliveries")]
async fn check_delivery_count(world: &mut DishDashWorld, count: usize) {
    let deliveries = world.system().deliveries.deliveries_for_order(world.order_id()).await.unwrap();
    assert_eq!(deliveries.len(), count);
}

#[then(expr = "the delivery is {word} to '{word}' at {string}")]
async fn check_delivery(world: &mut DishDashWorld, status: String, courier: String, address: String) {
    let status = DeliveryStatus::from_str(&status).expect("Not a valid delivery status");
    let delivery = world.system().deliveries.deliveries_for_order(world.order_id()).await.unwrap().remove(0);
    assert_eq!(delivery.status, status);
    assert_eq!(delivery.delivery_person_id, Some(courier));
    assert_eq!(delivery.delivery_address, address);
}

#[then(expr = "'{word}' has received {int} {word} message(s) containing {string}")]
async fn check_messages(world: &mut DishDashWorld, user: String, count: usize, channel: String, text: String) {
    let channel = match channel.as_str() {
        "email" => NotificationChannel::Email,
        "sms" | "SMS" => NotificationChannel::Sms,
        "push" => NotificationChannel::Push,
        _ => panic!("Unknown channel {channel}"),
    };
    let notifications = world.system().notifications.notifications_for_user(&user).await.unwrap();
    let matching = notifications
        .iter()
        .filter(|n| n.channel == channel && n.content.contains(&text) && n.status == NotificationStatus::Sent)
        .count();
    assert_eq!(matching, count, "Expected {count} {channel} messages containing '{text}' for {user}");
}

#[then(expr = "{int} side effect(s) are/is waiting to be retried")]
async fn check_pending_effects(world: &mut DishDashWorld, count: usize) {
    let effects = world.system().orders.side_effects_for_order(world.order_id()).await.unwrap();
    let pending = effects.iter().filter(|e| e.dispatched_at.is_none()).count();
    assert_eq!(pending, count);
}
