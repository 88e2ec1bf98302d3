use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::{audit, db_url, ledger, new_pool, order_items, orders, products, seller_sales, SqliteDatabaseError};
use crate::{
    allocation::allocate_seller_sales,
    db::{
        sqlite::orders::OrderQueryFilter,
        traits::{
            AuditManagement,
            InsertOrderResult,
            NewOrderRecord,
            OrderManagement,
            PaymentLedgerManagement,
            ProductAvailability,
            StoreError,
        },
    },
    db_types::{
        AuditEntry,
        FieldChange,
        LedgerEntry,
        NewAuditEntry,
        NewLedgerEntry,
        NewOrder,
        NewProduct,
        Order,
        OrderId,
        OrderItem,
        PaymentMethod,
        Product,
        ProductId,
        ProductStatus,
        SellerSale,
        UserId,
    },
    helpers::best_effort,
};

/// The SQLite store. The handle is cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `TSY_DATABASE_URL` environment variable, or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), SqliteDatabaseError> {
        self.pool.close().await;
        Ok(())
    }

    /// The idempotency key lost a race against a concurrent insert. The winner has committed by the time the unique
    /// index rejects us, so it can be read back.
    async fn resolve_duplicate_key(&self, key: &str) -> Result<InsertOrderResult, SqliteDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let existing = orders::fetch_order_by_idempotency_key(key, &mut conn)
            .await?
            .ok_or_else(|| SqliteDatabaseError::DuplicateIdempotencyKey(key.to_string()))?;
        debug!("🗃️ Idempotency key {key} belongs to order {}. Returning it.", existing.id);
        Ok(InsertOrderResult::AlreadyExists(existing))
    }

    async fn try_insert_order(&self, order: &NewOrder) -> Result<InsertOrderResult, SqliteDatabaseError> {
        let mut tx = self.pool.begin().await?;
        // The header insert comes first: it takes the write lock, so concurrent checkouts queue up here rather than
        // failing later on a stale read.
        let id = orders::insert_order(order, &mut tx).await?;
        let product_ids = order.product_ids();
        let claimed = products::claim(&product_ids, &mut tx).await?;
        let items = order_items::insert_items(id, &order.items, &claimed, &mut tx).await?;
        let owners = products::fetch_owners(&product_ids, &mut tx).await?;
        let sales = allocate_seller_sales(id, order.buyer_id, &items, &owners);
        seller_sales::insert_sales(&sales, &mut tx).await?;
        let unclaimed = product_ids.into_iter().filter(|p| !claimed.contains(p)).collect::<Vec<ProductId>>();
        let saved = orders::fetch_order_by_id(id, &mut tx).await?.ok_or(SqliteDatabaseError::OrderNotFound(id))?;
        tx.commit().await?;
        debug!(
            "🗃️ Order {id} saved with {} items, {} seller sales and {} unclaimed products",
            items.len(),
            sales.len(),
            unclaimed.len()
        );
        Ok(InsertOrderResult::Inserted(NewOrderRecord { order: saved, items, unclaimed }))
    }

    async fn try_apply_field_changes(
        &self,
        id: OrderId,
        actor: Option<UserId>,
        changes: &[FieldChange],
    ) -> Result<Option<Order>, SqliteDatabaseError> {
        let mut tx = self.pool.begin().await?;
        for change in changes {
            if !orders::update_field_if(id, change, &mut tx).await? {
                tx.rollback().await?;
                return Ok(None);
            }
            let entry = NewAuditEntry {
                order_id: id,
                actor_id: actor,
                field: change.field,
                old_value: change.old_value.clone(),
                new_value: change.new_value.clone(),
            };
            best_effort("order audit entry", audit::insert_audit_entry(&entry, &mut tx).await);
        }
        let order = orders::fetch_order_by_id(id, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }
}

impl From<SqliteDatabaseError> for StoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::OrderNotFound(id) => StoreError::OrderNotFound(id),
            SqliteDatabaseError::QueryError(s) => StoreError::InvalidRequest(s),
            e => StoreError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::from(SqliteDatabaseError::from(e))
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, StoreError> {
        if let Some(key) = order.idempotency_key.as_deref() {
            let mut conn = self.pool.acquire().await?;
            if let Some(existing) = orders::fetch_order_by_idempotency_key(key, &mut conn).await? {
                debug!("🗃️ Order with idempotency key {key} already exists as {}", existing.id);
                return Ok(InsertOrderResult::AlreadyExists(existing));
            }
        }
        match self.try_insert_order(&order).await {
            Err(e) if e.is_unique_violation() => {
                let key = order.idempotency_key.as_deref().unwrap_or_default();
                info!("🗃️ Concurrent insert for idempotency key {key} detected. Resolving to the winning order.");
                Ok(self.resolve_duplicate_key(key).await?)
            },
            result => Ok(result?),
        }
    }

    async fn fetch_order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn fetch_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_idempotency_key(key, &mut conn).await?)
    }

    async fn fetch_order_by_gateway_token(
        &self,
        method: PaymentMethod,
        token: &str,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_gateway_token(method, token, &mut conn).await?)
    }

    async fn fetch_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(order_items::fetch_items_for_order(id, &mut conn).await?)
    }

    async fn fetch_orders_for_buyer(&self, buyer: UserId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let query = OrderQueryFilter::default().with_buyer_id(buyer);
        Ok(orders::fetch_orders(query, &mut conn).await?)
    }

    async fn fetch_sales_for_seller(&self, seller: UserId) -> Result<Vec<SellerSale>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(seller_sales::fetch_sales_for_seller(seller, &mut conn).await?)
    }

    async fn set_gateway_token(&self, id: OrderId, method: PaymentMethod, token: &str) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::set_gateway_token(id, method, token, &mut conn).await?;
        order.ok_or(StoreError::OrderNotFound(id))
    }

    async fn apply_field_changes(
        &self,
        id: OrderId,
        actor: Option<UserId>,
        changes: &[FieldChange],
    ) -> Result<Option<Order>, StoreError> {
        Ok(self.try_apply_field_changes(id, actor, changes).await?)
    }

    async fn release_products_for_order(&self, id: OrderId) -> Result<Vec<ProductId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        // Products reported as unclaimed at checkout belong to whichever order did claim them, so they stay put.
        let claimed = order_items::fetch_claimed_products(id, &mut conn).await?;
        let mut released = Vec::with_capacity(claimed.len());
        for product_id in &claimed {
            released.extend(products::release(&[*product_id], &mut conn).await?);
        }
        debug!("🗃️ {} of {} claimed products released for order {id}", released.len(), claimed.len());
        Ok(released)
    }
}

impl ProductAvailability for SqliteDatabase {
    async fn claim_products(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::claim(ids, &mut conn).await?)
    }

    async fn release_products(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::release(ids, &mut conn).await?)
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(id, &mut conn).await?)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::insert_product(product, &mut conn).await?)
    }

    async fn set_product_status(&self, id: ProductId, status: ProductStatus) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        if products::set_product_status(id, status, &mut conn).await? {
            Ok(())
        } else {
            Err(StoreError::InvalidRequest(format!("Product {id} does not exist")))
        }
    }
}

impl AuditManagement for SqliteDatabase {
    async fn fetch_audit_log(&self, order_id: OrderId) -> Result<Vec<AuditEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(audit::fetch_audit_log(order_id, &mut conn).await?)
    }
}

impl PaymentLedgerManagement for SqliteDatabase {
    async fn append_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::insert_ledger_entry(entry, &mut conn).await?)
    }

    async fn fetch_ledger_entries(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_ledger(limit, &mut conn).await?)
    }

    async fn fetch_ledger_entries_for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_ledger_for_order(order_id, &mut conn).await?)
    }
}
