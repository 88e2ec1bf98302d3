use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewSellerSale, OrderId, SellerSale, UserId},
};

const SALE_COLUMNS: &str = "id, seller_id, order_id, buyer_id, product_id, title, price, created_at";

pub async fn insert_sales(sales: &[NewSellerSale], conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    for sale in sales {
        sqlx::query(
            r#"
            INSERT INTO seller_sales (seller_id, order_id, buyer_id, product_id, title, price)
            VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(sale.seller_id)
        .bind(sale.order_id)
        .bind(sale.buyer_id)
        .bind(sale.product_id)
        .bind(&sale.title)
        .bind(sale.price)
        .execute(&mut *conn)
        .await?;
    }
    trace!("🗃️ {} seller sale records saved", sales.len());
    Ok(())
}

/// All sales for the seller, newest first.
pub async fn fetch_sales_for_seller(
    seller_id: UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SellerSale>, SqliteDatabaseError> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM seller_sales WHERE seller_id = $1 ORDER BY created_at DESC, id DESC");
    let sales = sqlx::query_as::<_, SellerSale>(&sql).bind(seller_id).fetch_all(conn).await?;
    Ok(sales)
}

pub async fn fetch_sales_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SellerSale>, SqliteDatabaseError> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM seller_sales WHERE order_id = $1 ORDER BY id ASC");
    let sales = sqlx::query_as::<_, SellerSale>(&sql).bind(order_id).fetch_all(conn).await?;
    Ok(sales)
}
