//! Data types shared between the database backends and the public engine API.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use dishdash_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The order lifecycle.
///
/// `Pending → Confirmed → Preparing → Ready → Delivering → Delivered`, with `Cancelled` reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed, but the restaurant has not accepted it yet.
    Pending,
    /// The restaurant accepted the order. A delivery is created on entry to this state.
    Confirmed,
    Preparing,
    Ready,
    /// A courier is on the way with the order.
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::Delivering,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The only successor of this status on the happy path, if any.
    pub fn next(&self) -> Option<Self> {
        use OrderStatusType::*;
        match self {
            Pending => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(Ready),
            Ready => Some(Delivering),
            Delivering => Some(Delivered),
            Delivered | Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, new_status: OrderStatusType) -> bool {
        if self.is_terminal() {
            return false;
        }
        new_status == Self::Cancelled || self.next() == Some(new_status)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Preparing => "Preparing",
            Self::Ready => "Ready",
            Self::Delivering => "Delivering",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConversionError(format!("Invalid order status: {s}")))
    }
}

//--------------------------------------      OrderItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

impl OrderItem {
    pub fn new<S: Into<String>>(name: S, quantity: i64, unit_price: Cents) -> Self {
        Self { name: name.into(), quantity, unit_price }
    }

    pub fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_id: String,
    pub restaurant_id: String,
    pub items: Json<Vec<OrderItem>>,
    pub total_amount: Cents,
    pub status: OrderStatusType,
    /// The orchestrator's copy of the payment status, mirrored from payment reconciliation events.
    pub payment_status: PaymentStatus,
    /// Compare-and-swap stamp. Every status write increments it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn new<S1: Into<String>, S2: Into<String>>(customer_id: S1, restaurant_id: S2, items: Vec<OrderItem>) -> Self {
        Self { customer_id: customer_id.into(), restaurant_id: restaurant_id.into(), items }
    }

    /// The sum of all line totals, or `None` if it cannot be represented.
    pub fn total_amount(&self) -> Option<Cents> {
        self.items.iter().try_fold(Cents::default(), |acc, item| item.line_total().map(|t| acc + t))
    }
}

//--------------------------------------    DeliveryStatus     ---------------------------------------------------------
/// The courier-side lifecycle of a delivery.
///
/// `Unassigned → Assigned → PickedUp → Delivering → Delivered`, with `Cancelled` reachable from any non-terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Unassigned,
    Assigned,
    PickedUp,
    Delivering,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 6] =
        [Self::Unassigned, Self::Assigned, Self::PickedUp, Self::Delivering, Self::Delivered, Self::Cancelled];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn can_transition_to(&self, new_status: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, new_status) {
            (old, _) if old.is_terminal() => false,
            (_, Cancelled) => true,
            (Unassigned, Assigned) | (Assigned, PickedUp) | (PickedUp, Delivering) | (Delivering, Delivered) => true,
            _ => false,
        }
    }
}

impl Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
            Self::PickedUp => "picked_up",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for DeliveryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConversionError(format!("Invalid delivery status: {s}")))
    }
}

//--------------------------------------       Delivery        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub delivery_person_id: Option<String>,
    /// The customer receiving the delivery
    pub user_id: String,
    pub delivery_address: String,
    pub delivery_fee: Cents,
    pub status: DeliveryStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    /// What the courier reported earning for this delivery, excluding tips
    pub courier_earnings: Cents,
    pub tip: Cents,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDelivery {
    pub order_id: i64,
    pub user_id: String,
    pub delivery_address: String,
    pub delivery_fee: Cents,
    /// If not supplied, the first available courier is picked. If nobody is available, the delivery stays unassigned.
    pub delivery_person_id: Option<String>,
}

impl NewDelivery {
    pub fn new<S1: Into<String>, S2: Into<String>>(order_id: i64, user_id: S1, address: S2, fee: Cents) -> Self {
        Self {
            order_id,
            user_id: user_id.into(),
            delivery_address: address.into(),
            delivery_fee: fee,
            delivery_person_id: None,
        }
    }

    pub fn with_courier<S: Into<String>>(mut self, courier_id: S) -> Self {
        self.delivery_person_id = Some(courier_id.into());
        self
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Wallet,
}

//--------------------------------------       Payment         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub user_id: String,
    pub amount: Cents,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    /// The payment processor's intent id. Webhook reconciliation joins on this, never on `id` or `order_id`.
    pub external_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: i64,
    pub user_id: String,
    pub amount: Cents,
    pub payment_method: PaymentMethod,
    pub external_intent_id: String,
}

//--------------------------------------     Notifications     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

impl Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Sms => f.write_str("sms"),
            Self::Push => f.write_str("push"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub content: String,
    pub order_id: Option<i64>,
    pub idempotency_key: String,
    pub status: NotificationStatus,
    pub read: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub content: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    /// Duplicate dispatches with the same key are discarded once one of them has been sent.
    /// A random key is generated if none is supplied.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl NewNotification {
    pub fn new<S1: Into<String>, S2: Into<String>>(user_id: S1, channel: NotificationChannel, content: S2) -> Self {
        Self { user_id: user_id.into(), channel, content: content.into(), order_id: None, idempotency_key: None }
    }

    pub fn for_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

//--------------------------------------    LocationRecord     ---------------------------------------------------------
/// The last reported position of a courier. There is no history; every report overwrites the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LocationRecord {
    pub agent_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    RestaurantAdmin,
    DeliveryPerson,
    Admin,
    /// A sibling service calling on its own behalf
    Service,
}

impl Role {
    /// Staff roles may see any order or room.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::RestaurantAdmin | Self::Admin | Self::Service)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Customer => "customer",
            Self::RestaurantAdmin => "restaurant_admin",
            Self::DeliveryPerson => "delivery_person",
            Self::Admin => "admin",
            Self::Service => "service",
        };
        f.write_str(s)
    }
}

//--------------------------------------      UserProfile      ---------------------------------------------------------
/// The subset of the user service's profile that orchestration needs: contact details, addresses, and courier
/// availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Only meaningful for couriers
    pub available: bool,
}

//--------------------------------------      OutboxEntry      ---------------------------------------------------------
/// A side effect that an order write has committed to performing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    AssignDelivery { order_id: i64, customer_id: String },
    Notify { user_id: String, channel: NotificationChannel, order_id: i64, content: String },
}

impl SideEffect {
    pub fn label(&self) -> String {
        match self {
            Self::AssignDelivery { .. } => "assign_delivery".to_string(),
            Self::Notify { channel, .. } => channel.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OutboxEntry {
    pub id: i64,
    pub idempotency_key: String,
    pub order_id: i64,
    pub effect: Json<SideEffect>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A side effect that has not been written to the outbox yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEntry {
    pub idempotency_key: String,
    pub order_id: i64,
    pub effect: SideEffect,
}

impl NewOutboxEntry {
    /// Creates an entry whose idempotency key is derived from the order, the status that caused it and the effect.
    /// Replaying the same transition therefore produces the same key.
    pub fn for_transition(order_id: i64, target: OrderStatusType, effect: SideEffect) -> Self {
        let idempotency_key = format!("order-{order_id}:{target}:{}", effect.label());
        Self { idempotency_key, order_id, effect }
    }
}
