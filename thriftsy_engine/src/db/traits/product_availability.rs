use crate::{
    db::traits::StoreError,
    db_types::{NewProduct, Product, ProductId, ProductStatus},
};

/// Product availability guard. Implementations must express both moves as conditional updates against the stored
/// status. Read-then-write in application code is not acceptable, since this is the only protection against selling
/// a unique item twice.
#[allow(async_fn_in_trait)]
pub trait ProductAvailability {
    /// `unsold → order_received`. Returns the subset of `ids` that was actually claimed.
    async fn claim_products(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError>;

    /// `order_received → unsold`. Returns the subset of `ids` that was actually released. Products that are `sold` are
    /// never touched.
    async fn release_products(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, StoreError>;

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Adds a listing on behalf of the catalog.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// Sets the status unconditionally, on behalf of the catalog (e.g. marking an item as handed over and `sold`).
    async fn set_product_status(&self, id: ProductId, status: ProductStatus) -> Result<(), StoreError>;
}
