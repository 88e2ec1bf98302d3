use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderItem, Paisa, PaymentMethod, ProductId};

/// A new order was stored. Not emitted when an idempotent retry returns an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// Cart products that another order already held at checkout
    pub unclaimed: Vec<ProductId>,
}

impl OrderCreatedEvent {
    pub fn new(order: Order, items: Vec<OrderItem>, unclaimed: Vec<ProductId>) -> Self {
        Self { order, items, unclaimed }
    }
}

/// A gateway confirmed payment for an order and the order's payment status moved to `paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub method: PaymentMethod,
    pub gateway_txn_id: Option<String>,
    pub amount: Option<Paisa>,
}

impl OrderPaidEvent {
    pub fn new(order: Order, method: PaymentMethod, gateway_txn_id: Option<String>, amount: Option<Paisa>) -> Self {
        Self { order, method, gateway_txn_id, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    /// Products that went back on sale as a result
    pub released: Vec<ProductId>,
}

impl OrderCancelledEvent {
    pub fn new(order: Order, released: Vec<ProductId>) -> Self {
        Self { order, released }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderPaid(OrderPaidEvent),
    OrderCancelled(OrderCancelledEvent),
}
