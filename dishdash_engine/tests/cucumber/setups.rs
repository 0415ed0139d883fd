use cucumber::given;
use dishdash_engine::{
    db_types::{Role, UserProfile},
    traits::ProfileManagement,
};

use crate::{cucumber::DishDashWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut DishDashWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "customer '{word}' with email '{word}', phone '{word}' and address {string}")]
async fn customer_with_details(world: &mut DishDashWorld, user_id: String, email: String, phone: String, address: String) {
    let db = &world.system().db;
    let profile = UserProfile { user_id: user_id.clone(), role: Role::Customer, email: Some(email), phone: Some(phone), available: false };
    db.upsert_profile(profile).await.expect("Error creating customer");
    db.add_address(&user_id, &address).await.expect("Error adding address");
}

#[given(expr = "an available courier '{word}'")]
async fn available_courier(world: &mut DishDashWorld, courier_id: String) {
    world.system().add_courier(&courier_id).await;
}
