use crate::{
    db::traits::StoreError,
    db_types::{LedgerEntry, NewLedgerEntry, OrderId},
};

/// The append-only payment ledger. It is an evidence trail of what the gateways told us; the order itself remains the
/// authoritative payment state.
#[allow(async_fn_in_trait)]
pub trait PaymentLedgerManagement {
    async fn append_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// The most recent entries, newest first.
    async fn fetch_ledger_entries(&self, limit: i64) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn fetch_ledger_entries_for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, StoreError>;
}
