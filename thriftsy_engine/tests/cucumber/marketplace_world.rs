use std::collections::HashMap;

use cucumber::World;
use thriftsy_engine::{
    db_types::{OrderId, ProductId},
    events::EventProducers,
    order_objects::CreateOrderResult,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerApi,
    OrderFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    /// Listings by title
    pub products: HashMap<String, ProductId>,
    /// Checkout results by a name the scenario gives them
    pub orders: HashMap<String, CreateOrderResult>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db: SqliteDatabase,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let orders = OrderFlowApi::new(db.clone(), EventProducers::default());
        let ledger = LedgerApi::new(db.clone());
        Self { db, orders, ledger }
    }
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised. Start the scenario with 'Given a fresh marketplace'")
    }

    pub fn product(&self, title: &str) -> ProductId {
        *self.products.get(title).unwrap_or_else(|| panic!("No listing called {title}"))
    }

    pub fn order_id(&self, name: &str) -> OrderId {
        self.orders.get(name).unwrap_or_else(|| panic!("No order called {name}")).order.id
    }
}
