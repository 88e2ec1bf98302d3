use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::PaymentLedgerManagement,
    db_types::{LedgerEntry, NewLedgerEntry, OrderId},
    engine_api::errors::OrderFlowError,
    helpers::best_effort,
};

/// Number of entries returned by [`LedgerApi::latest`] when the caller does not say.
pub const DEFAULT_LEDGER_PAGE: i64 = 50;

/// Access to the append-only payment ledger.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LedgerApi<B>
where B: PaymentLedgerManagement
{
    /// Appends an entry. A failure is logged at `warn` and swallowed.
    pub async fn record(&self, entry: NewLedgerEntry) -> Option<LedgerEntry> {
        let (method, status) = (entry.method, entry.status);
        let result = best_effort("payment ledger entry", self.db.append_ledger_entry(entry).await);
        if let Some(saved) = &result {
            debug!("💳️ Ledger #{}: {method} {status} for order {:?}", saved.id, saved.order_id);
        }
        result
    }

    pub async fn latest(&self, limit: Option<i64>) -> Result<Vec<LedgerEntry>, OrderFlowError> {
        let limit = limit.unwrap_or(DEFAULT_LEDGER_PAGE).clamp(1, 500);
        Ok(self.db.fetch_ledger_entries(limit).await?)
    }

    pub async fn for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>, OrderFlowError> {
        Ok(self.db.fetch_ledger_entries_for_order(order_id).await?)
    }
}
