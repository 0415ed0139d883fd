//! The real-time status bus.
//!
//! Clients subscribe to named rooms and receive status and location updates as they happen. Delivery is
//! at-most-once: an event published to a room with nobody listening is simply dropped, and a subscriber that falls
//! too far behind loses the oldest events. Clients that were disconnected must re-fetch state over REST.
mod events;
mod room;
mod status_bus;

pub use events::{BusEvent, DeliveryLocationUpdate, NotificationPushed, OrderStatusUpdate, PaymentStatusUpdate};
pub use room::{Room, RoomParseError};
pub use status_bus::StatusBus;
