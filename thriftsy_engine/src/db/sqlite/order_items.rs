use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{CartItem, OrderId, OrderItem, ProductId},
};

/// Snapshots each cart line as an order item. Call inside the order creation transaction, after the claim, so that
/// each line records whether this order holds its product.
pub async fn insert_items(
    order_id: OrderId,
    items: &[CartItem],
    claimed: &[ProductId],
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let is_claimed = item.product_id.is_some_and(|p| claimed.contains(&p));
        let row = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, product_id, title, price, claimed) VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, product_id, title, price, claimed;
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.title)
        .bind(item.price)
        .bind(is_claimed)
        .fetch_one(&mut *conn)
        .await?;
        result.push(row);
    }
    trace!("🗃️ {} items saved for order {order_id}", result.len());
    Ok(result)
}

pub async fn fetch_items_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, title, price, claimed FROM order_items WHERE order_id = $1 ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// The distinct products that this order claimed at checkout.
pub async fn fetch_claimed_products(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductId>, SqliteDatabaseError> {
    let ids = sqlx::query_scalar::<_, ProductId>(
        r#"
        SELECT DISTINCT product_id FROM order_items
        WHERE order_id = $1 AND claimed = 1 AND product_id IS NOT NULL
        ORDER BY product_id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}
