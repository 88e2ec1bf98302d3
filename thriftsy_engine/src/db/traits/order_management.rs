use crate::{
    db::traits::{InsertOrderResult, StoreError},
    db_types::{FieldChange, NewOrder, Order, OrderId, OrderItem, PaymentMethod, ProductId, SellerSale, UserId},
};

/// The `OrderManagement` trait defines the behaviour for storing and querying orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Takes a new order, and in a single atomic transaction,
    /// * stores the order header with `pending` payment and order status,
    /// * stores one order item per cart line,
    /// * stores one seller sale per item whose product has a known owner,
    /// * claims every referenced product that is still `unsold`.
    ///
    /// If the order carries an idempotency key that is already in use, nothing is written and the existing order is
    /// returned as [`InsertOrderResult::AlreadyExists`]. This includes the case where a concurrent request with the same
    /// key wins the race to insert.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, StoreError>;

    async fn fetch_order_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, StoreError>;

    /// Finds the order that a gateway correlation token was issued for.
    async fn fetch_order_by_gateway_token(
        &self,
        method: PaymentMethod,
        token: &str,
    ) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// Orders placed by the buyer, newest first.
    async fn fetch_orders_for_buyer(&self, buyer: UserId) -> Result<Vec<Order>, StoreError>;

    /// Sales records for the seller, newest first.
    async fn fetch_sales_for_seller(&self, seller: UserId) -> Result<Vec<SellerSale>, StoreError>;

    /// Stores a per-attempt gateway correlation token in the gateway's slot on the order.
    async fn set_gateway_token(&self, id: OrderId, method: PaymentMethod, token: &str) -> Result<Order, StoreError>;

    /// Applies all `changes` to the order in one transaction, each as a compare-and-set on its old value, and writes one
    /// audit entry per change attributed to `actor`.
    ///
    /// Returns `None` without changing anything if any field no longer holds its expected old value. Callers should
    /// re-read the order and decide again.
    async fn apply_field_changes(
        &self,
        id: OrderId,
        actor: Option<UserId>,
        changes: &[FieldChange],
    ) -> Result<Option<Order>, StoreError>;

    /// Releases every product referenced by the order's items that is still `order_received`. Each product is released
    /// with its own conditional update. Returns the released products.
    async fn release_products_for_order(&self, id: OrderId) -> Result<Vec<ProductId>, StoreError>;
}
