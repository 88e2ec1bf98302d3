//! Product availability.
//!
//! A product moves `unsold → order_received` when an order claims it, and back when that order is cancelled. Both
//! moves are single conditional `UPDATE`s against the stored status, so two checkouts racing for the same item can
//! never both win, and a product the catalog has marked `sold` is never touched.
use std::collections::HashMap;

use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewProduct, Product, ProductId, ProductStatus, UserId},
};

/// Moves every product in `ids` that is currently `from` into `to`, returning the ids that were actually moved.
async fn conditional_status_update(
    ids: &[ProductId],
    from: ProductStatus,
    to: ProductStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductId>, SqliteDatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = CURRENT_TIMESTAMP WHERE status = ");
    builder.push_bind(from);
    builder.push(" AND id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(") RETURNING id");
    trace!("🗃️ Executing query: {}", builder.sql());
    let moved = builder.build_query_scalar::<ProductId>().fetch_all(conn).await?;
    debug!("🗃️ {}/{} products moved from {from} to {to}", moved.len(), ids.len());
    Ok(moved)
}

/// `unsold → order_received`. Returns the subset that was claimed.
pub async fn claim(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<ProductId>, SqliteDatabaseError> {
    conditional_status_update(ids, ProductStatus::Unsold, ProductStatus::OrderReceived, conn).await
}

/// `order_received → unsold`. Returns the subset that was released.
pub async fn release(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<ProductId>, SqliteDatabaseError> {
    conditional_status_update(ids, ProductStatus::OrderReceived, ProductStatus::Unsold, conn).await
}

/// Resolves product owners. Products that no longer exist, or have no owner, are absent from the result.
pub async fn fetch_owners(
    ids: &[ProductId],
    conn: &mut SqliteConnection,
) -> Result<HashMap<ProductId, UserId>, SqliteDatabaseError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, seller_id FROM products WHERE seller_id IS NOT NULL AND id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
    let rows = builder.build_query_as::<(ProductId, UserId)>().fetch_all(conn).await?;
    Ok(rows.into_iter().collect())
}

pub async fn fetch_product(id: ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>("SELECT id, seller_id, title, price, status FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

/// Adds a product listing. Listings are owned by the catalog; this exists so that the engine can be exercised on its
/// own.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, SqliteDatabaseError> {
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (seller_id, title, price) VALUES ($1, $2, $3) RETURNING id, seller_id, title, price, status",
    )
    .bind(product.seller_id)
    .bind(product.title)
    .bind(product.price)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

/// Sets a product's status unconditionally. The catalog uses this to mark items as sold once they are handed over.
pub async fn set_product_status(
    id: ProductId,
    status: ProductStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE products SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}
