use chrono::Utc;
use cucumber::given;

use crate::{cucumber::FeeWorld, support::TestSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut FeeWorld) {
    let system = TestSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a cargo contract for bid '{word}' between shipper '{word}' and trucker '{word}' at {int} pesos")]
async fn cargo_contract(world: &mut FeeWorld, bid: String, shipper: String, trucker: String, price: i64) {
    let accepted_at = Utc::now();
    world.system().cargo_contract(&bid, &shipper, &trucker, price, accepted_at).await;
    world.accepted_at = Some(accepted_at);
}
