use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{AuditEntry, NewAuditEntry, OrderId},
};

pub async fn insert_audit_entry(entry: &NewAuditEntry, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO order_audit_log (order_id, actor_id, field, old_value, new_value) VALUES ($1, $2, $3, $4, $5)
        RETURNING id;
        "#,
    )
    .bind(entry.order_id)
    .bind(entry.actor_id)
    .bind(entry.field.column())
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Audit #{id}: order {} {} {} -> {}", entry.order_id, entry.field, entry.old_value, entry.new_value);
    Ok(id)
}

/// The audit trail for an order, in the order the transitions happened.
pub async fn fetch_audit_log(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<AuditEntry>, SqliteDatabaseError> {
    let entries = sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT id, order_id, actor_id, field, old_value, new_value, created_at
        FROM order_audit_log WHERE order_id = $1 ORDER BY id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}
