//! The public engine API.
//!
//! Each API object wraps a storage backend (anything implementing the relevant [`crate::traits`]) together with the
//! status bus and the event hooks, and implements one service's behaviour on top of them.
pub mod delivery_api;
pub mod delivery_objects;
pub mod errors;
pub mod location_api;
pub mod notification_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod outbox;
pub mod payment_api;
pub mod payment_objects;
