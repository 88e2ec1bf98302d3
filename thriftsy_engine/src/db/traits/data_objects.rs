use serde::Serialize;

use crate::db_types::{Order, OrderItem, ProductId};

/// The result of storing a new order.
#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    /// The order was created, along with its items and seller records.
    Inserted(NewOrderRecord),
    /// An order with the same idempotency key already existed, and is returned unchanged.
    AlreadyExists(Order),
}

/// A freshly created order together with the product claims that were made for it.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderRecord {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Products that were in the cart but could not be claimed because another order already holds them (or the
    /// listing is gone or sold).
    pub unclaimed: Vec<ProductId>,
}
