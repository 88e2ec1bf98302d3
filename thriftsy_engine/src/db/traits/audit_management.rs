use crate::{
    db::traits::StoreError,
    db_types::{AuditEntry, OrderId},
};

/// Read access to the order audit log. Entries are written by [`super::OrderManagement::apply_field_changes`] in the
/// same transaction as the change they describe.
#[allow(async_fn_in_trait)]
pub trait AuditManagement {
    /// The audit trail for the order, oldest first.
    async fn fetch_audit_log(&self, order_id: OrderId) -> Result<Vec<AuditEntry>, StoreError>;
}
