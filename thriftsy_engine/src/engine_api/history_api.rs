use std::fmt::Debug;

use log::*;

use crate::{
    allocation::revenue_by_seller,
    db::traits::{AuditManagement, OrderManagement},
    db_types::{AuditEntry, OrderId, UserId},
    engine_api::{
        errors::OrderFlowError,
        order_objects::{OrderWithItems, SalesHistory},
    },
};

/// Read models for buyers, sellers and administrators.
pub struct HistoryApi<B> {
    db: B,
}

impl<B> Debug for HistoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HistoryApi")
    }
}

impl<B> HistoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> HistoryApi<B>
where B: OrderManagement
{
    pub async fn order_with_items(&self, id: OrderId) -> Result<OrderWithItems, OrderFlowError> {
        let order = self.db.fetch_order_by_id(id).await?.ok_or(OrderFlowError::OrderNotFound(id))?;
        let items = self.db.fetch_order_items(id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// The buyer's orders, newest first, each with its items.
    pub async fn orders_for_buyer(&self, buyer: UserId) -> Result<Vec<OrderWithItems>, OrderFlowError> {
        let orders = self.db.fetch_orders_for_buyer(buyer).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.db.fetch_order_items(order.id).await?;
            result.push(OrderWithItems { order, items });
        }
        trace!("📦️ {} orders fetched for buyer {buyer}", result.len());
        Ok(result)
    }

    /// Everything the seller has sold, read from the per-seller sale records rather than from buyers' orders.
    pub async fn sales_for_seller(&self, seller: UserId) -> Result<SalesHistory, OrderFlowError> {
        let sales = self.db.fetch_sales_for_seller(seller).await?;
        let revenue = revenue_by_seller(sales.iter().map(|s| (s.seller_id, s.price)));
        Ok(SalesHistory { sales, revenue })
    }
}

impl<B> HistoryApi<B>
where B: AuditManagement
{
    pub async fn audit_log(&self, order_id: OrderId) -> Result<Vec<AuditEntry>, OrderFlowError> {
        Ok(self.db.fetch_audit_log(order_id).await?)
    }
}
