//! DishDash Engine
//!
//! The DishDash engine is the order lifecycle core of a food-ordering marketplace. It takes an order from placement
//! to delivery and drives the services that hang off it: delivery assignment and tracking, payment intents and
//! their reconciliation, customer notifications, and live courier location.
//!
//! The library is divided into these sections:
//! 1. Storage. The contracts a backend must fulfil live in [`mod@traits`], and [`SqliteDatabase`] fulfils all of
//!    them. You should not need to touch the database directly; use the APIs instead. The data types that pass
//!    through the storage layer are defined in [`mod@db_types`].
//! 2. The public APIs ([`mod@dd_api`]). [`OrderFlowApi`] is the orchestrator. Each of the other APIs implements one
//!    service: [`DeliveryApi`], [`PaymentApi`], [`NotificationApi`] and [`LocationApi`].
//! 3. The real-time status bus ([`mod@realtime`]), through which clients are pushed status and location updates.
//! 4. The boundaries with external systems: the payment processor ([`mod@gateway`]) and the email/SMS relay
//!    ([`mod@notify`]).
//!
//! The engine also emits events that the host application can hook into (see [`mod@events`]). For example, the
//! server uses the payment-updated hook to mirror payment outcomes onto orders.
pub mod db_types;
pub mod dd_api;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod realtime;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use dd_api::{
    delivery_api::DeliveryApi,
    errors::SideEffectError,
    location_api::LocationApi,
    notification_api::NotificationApi,
    order_flow_api::OrderFlowApi,
    outbox::{DispatchConfig, EntryOutcome, OutboxDispatcher},
    payment_api::PaymentApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
