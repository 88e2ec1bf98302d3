//! Seller allocation.
//!
//! A marketplace order can contain items from several sellers. Each item whose product has a known owner becomes one
//! [`NewSellerSale`] for that owner, so a seller's sales history never has to be reconstructed from other buyers'
//! orders. Items whose product has been deleted, or whose owner is unknown, are left out; they remain on the order.
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::db_types::{NewSellerSale, OrderId, OrderItem, Paisa, ProductId, UserId};

/// Fans the order's items out into one sale record per (seller, item).
pub fn allocate_seller_sales(
    order_id: OrderId,
    buyer_id: Option<UserId>,
    items: &[OrderItem],
    owners: &HashMap<ProductId, UserId>,
) -> Vec<NewSellerSale> {
    items
        .iter()
        .filter_map(|item| {
            let product_id = item.product_id?;
            let seller_id = *owners.get(&product_id)?;
            Some(NewSellerSale {
                seller_id,
                order_id,
                buyer_id,
                product_id: Some(product_id),
                title: item.title.clone(),
                price: item.price,
            })
        })
        .collect()
}

/// Per-seller revenue for a set of sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SellerRevenue {
    pub seller_id: UserId,
    pub item_count: usize,
    pub total: Paisa,
}

/// Sums `(seller, price)` pairs per seller, ordered by seller id.
pub fn revenue_by_seller<I>(sales: I) -> Vec<SellerRevenue>
where I: IntoIterator<Item = (UserId, Paisa)> {
    let mut totals = BTreeMap::<UserId, (usize, Paisa)>::new();
    for (seller, price) in sales {
        let entry = totals.entry(seller).or_default();
        entry.0 += 1;
        entry.1 += price;
    }
    totals.into_iter().map(|(seller_id, (item_count, total))| SellerRevenue { seller_id, item_count, total }).collect()
}
