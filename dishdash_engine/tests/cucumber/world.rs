use std::fmt::Debug;

use cucumber::World;
use dishdash_engine::db_types::{Order, OrderItem};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct DishDashWorld {
    pub system: Option<TestSystem>,
    /// Items for the next order to be placed
    pub basket: Vec<OrderItem>,
    pub order: Option<Order>,
    /// The error from the most recent command that failed, if the scenario expects failures
    pub last_error: Option<String>,
}

impl Debug for DishDashWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DishDashWorld")
            .field("db", &self.system.as_ref().map(|s| s.db.url().to_string()))
            .field("basket", &self.basket)
            .field("order", &self.order.as_ref().map(|o| o.id))
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl DishDashWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("The system has not been initialised")
    }

    pub fn order_id(&self) -> i64 {
        self.order.as_ref().map(|o| o.id).expect("No order has been placed")
    }
}
