#![allow(dead_code)]

use thriftsy_engine::{
    db_types::{NewProduct, Paisa, Product, UserId},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    ProductAvailability,
    SqliteDatabase,
};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const SELLER_A: UserId = UserId(10);
pub const SELLER_B: UserId = UserId(11);

pub async fn setup() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await
}

pub fn order_api(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default())
}

pub async fn list_product(db: &SqliteDatabase, seller: UserId, title: &str, rupees: i64) -> Product {
    db.insert_product(NewProduct::new(Some(seller), title, Paisa::from_rupees(rupees)))
        .await
        .expect("Error adding product")
}
