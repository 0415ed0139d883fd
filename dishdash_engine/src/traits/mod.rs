//! # Database backend contracts
//!
//! This module defines the behaviour a storage backend must expose to drive the DishDash engine. Each entity type
//! is owned by exactly one trait, and the public APIs only ever touch an entity through its owning trait.
//!
//! * [`OrderManagement`] owns orders, including the atomic status-write-plus-outbox operation.
//! * [`OutboxManagement`] owns the side-effect outbox and its retry bookkeeping.
//! * [`DeliveryManagement`] owns deliveries, couriers' assignments, ratings and earnings.
//! * [`PaymentManagement`] owns local payment records, keyed by the processor's intent id.
//! * [`NotificationManagement`] owns the record of every notification dispatch attempt.
//! * [`LocationManagement`] owns the last-known position of each courier.
//! * [`ProfileManagement`] is the boundary store of the user service: contact details, addresses and courier
//!   availability.
mod data_objects;
mod delivery_management;
mod location_management;
mod notification_management;
mod order_management;
mod outbox_management;
mod payment_management;
mod profile_management;

pub use data_objects::{NotificationRecord, OrderQueryFilter};
pub use delivery_management::{DeliveryError, DeliveryManagement};
pub use location_management::{LocationError, LocationManagement};
pub use notification_management::{NotificationError, NotificationManagement};
pub use order_management::{OrderFlowError, OrderManagement};
pub use outbox_management::{OutboxError, OutboxManagement};
pub use payment_management::{PaymentApiError, PaymentManagement};
pub use profile_management::{ProfileError, ProfileManagement};

