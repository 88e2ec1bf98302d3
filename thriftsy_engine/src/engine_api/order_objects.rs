use serde::{Deserialize, Serialize};

use crate::{
    allocation::SellerRevenue,
    db_types::{Order, OrderItem, ProductId, SellerSale},
};

/// The outcome of [`super::order_flow_api::OrderFlowApi::create_order`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// `true` if the idempotency key matched an order that already existed. Nothing was written in that case.
    pub existing: bool,
    /// Products in the cart that were not claimed for this order because they were no longer available.
    pub unclaimed: Vec<ProductId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A seller's view of their sales, along with the totals per seller.
#[derive(Debug, Clone, Serialize)]
pub struct SalesHistory {
    pub sales: Vec<SellerSale>,
    pub revenue: Vec<SellerRevenue>,
}
