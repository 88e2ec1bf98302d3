use cucumber::given;
use thriftsy_engine::{
    db_types::{NewProduct, Paisa, UserId},
    ProductAvailability,
};

use crate::cucumber::{marketplace_world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh marketplace")]
async fn fresh_marketplace(world: &mut MarketplaceWorld) {
    world.system = Some(MarketplaceSystem::new().await);
}

#[given(expr = "seller {int} lists {string} for Rs {int}")]
async fn list_product(world: &mut MarketplaceWorld, seller: i64, title: String, rupees: i64) {
    let product = NewProduct::new(Some(UserId(seller)), title.clone(), Paisa::from_rupees(rupees));
    let product = world.system().db.insert_product(product).await.expect("Error adding listing");
    world.products.insert(title, product.id);
}
