use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{FieldChange, NewOrder, Order, OrderId, OrderStatusType, PaymentMethod, PaymentStatus, UserId},
};

const ORDER_COLUMNS: &str = "id, buyer_id, subtotal, tax, shipping, total, payment_method, payment_status, status, \
                             shipping_address, idempotency_key, esewa_transaction_uuid, khalti_pidx, created_at, \
                             updated_at";

/// Inserts a new order header with `pending` payment and order status. This is not atomic. Embed the call in a
/// transaction along with the items, and pass `&mut *tx` as the connection argument.
///
/// A duplicate idempotency key fails with a UNIQUE constraint violation, see
/// [`SqliteDatabaseError::is_unique_violation`].
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<OrderId, SqliteDatabaseError> {
    let address = order.shipping_address.clone().map(Json);
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (
                buyer_id,
                subtotal,
                tax,
                shipping,
                total,
                payment_method,
                shipping_address,
                idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id;
        "#,
    )
    .bind(order.buyer_id)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.total)
    .bind(order.payment_method)
    .bind(address)
    .bind(order.idempotency_key.as_deref())
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Inserted order #{id}");
    Ok(OrderId(id))
}

pub async fn fetch_order_by_id(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_idempotency_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1 LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(key).fetch_optional(conn).await?;
    Ok(order)
}

/// Finds the order carrying the given gateway correlation token. Cash-on-delivery and bank transfers have no tokens,
/// so this always returns `None` for those methods.
pub async fn fetch_order_by_gateway_token(
    method: PaymentMethod,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let column = match method {
        PaymentMethod::Esewa => "esewa_transaction_uuid",
        PaymentMethod::Khalti => "khalti_pidx",
        PaymentMethod::Cod | PaymentMethod::BankTransfer => return Ok(None),
    };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1 ORDER BY id DESC LIMIT 1");
    let order = sqlx::query_as::<_, Order>(&sql).bind(token).fetch_optional(conn).await?;
    Ok(order)
}

/// Stores a fresh gateway correlation token on the order and records the payment method that is being attempted.
/// Returns the updated order, or `None` if the order does not exist.
pub async fn set_gateway_token(
    id: OrderId,
    method: PaymentMethod,
    token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let column = match method {
        PaymentMethod::Esewa => "esewa_transaction_uuid",
        PaymentMethod::Khalti => "khalti_pidx",
        PaymentMethod::Cod | PaymentMethod::BankTransfer => {
            return Err(SqliteDatabaseError::QueryError(format!("{method} payments do not have a gateway token")))
        },
    };
    let sql = format!(
        "UPDATE orders SET {column} = $1, payment_method = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 RETURNING \
         {ORDER_COLUMNS}"
    );
    let order = sqlx::query_as::<_, Order>(&sql).bind(token).bind(method).bind(id).fetch_optional(conn).await?;
    debug!("🗃️ {method} token {token} stored on order {id}");
    Ok(order)
}

/// Applies a single compare-and-set field change. Returns `true` if the row still held the expected old value and was
/// updated.
pub async fn update_field_if(
    id: OrderId,
    change: &FieldChange,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let column = change.field.column();
    let sql = format!("UPDATE orders SET {column} = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND {column} = $3");
    let result =
        sqlx::query(&sql).bind(&change.new_value).bind(id).bind(&change.old_value).execute(conn).await?;
    let updated = result.rows_affected() == 1;
    trace!(
        "🗃️ CAS {column} {} -> {} on order {id}: {}",
        change.old_value,
        change.new_value,
        if updated { "applied" } else { "stale" }
    );
    Ok(updated)
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    buyer_id: Option<UserId>,
    payment_method: Option<PaymentMethod>,
    statuses: Vec<OrderStatusType>,
    payment_statuses: Vec<PaymentStatus>,
}

impl OrderQueryFilter {
    pub fn with_buyer_id(mut self, buyer_id: UserId) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buyer_id.is_none() &&
            self.payment_method.is_none() &&
            self.statuses.is_empty() &&
            self.payment_statuses.is_empty()
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered newest first.
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(method) = query.payment_method {
        where_clause.push("payment_method = ");
        where_clause.push_bind_unseparated(method);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if !query.payment_statuses.is_empty() {
        where_clause.push("payment_status IN (");
        for (i, status) in query.payment_statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {:?}", orders.len());
    Ok(orders)
}
