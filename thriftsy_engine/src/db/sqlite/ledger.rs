use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{LedgerEntry, NewLedgerEntry, OrderId, NPR_CURRENCY_CODE},
};

const LEDGER_COLUMNS: &str = "id, order_id, method, gateway_txn_id, amount, currency, status, raw_payload, created_at";

/// Appends a row to the payment ledger. Rows are never updated; a corrected status is a new row.
pub async fn insert_ledger_entry(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, SqliteDatabaseError> {
    let sql = format!(
        "INSERT INTO payment_ledger (order_id, method, gateway_txn_id, amount, currency, status, raw_payload) VALUES \
         ($1, $2, $3, $4, $5, $6, $7) RETURNING {LEDGER_COLUMNS}"
    );
    let payload = if entry.raw_payload.is_null() { None } else { Some(Json(entry.raw_payload)) };
    let row = sqlx::query_as::<_, LedgerEntry>(&sql)
        .bind(entry.order_id)
        .bind(entry.method)
        .bind(entry.gateway_txn_id)
        .bind(entry.amount)
        .bind(NPR_CURRENCY_CODE)
        .bind(entry.status)
        .bind(payload)
        .fetch_one(conn)
        .await?;
    trace!("🗃️ Ledger #{} appended: {} {} for order {:?}", row.id, row.method, row.status, row.order_id);
    Ok(row)
}

/// The most recent `limit` ledger rows, newest first.
pub async fn fetch_ledger(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<LedgerEntry>, SqliteDatabaseError> {
    let sql = format!("SELECT {LEDGER_COLUMNS} FROM payment_ledger ORDER BY id DESC LIMIT $1");
    let rows = sqlx::query_as::<_, LedgerEntry>(&sql).bind(limit).fetch_all(conn).await?;
    Ok(rows)
}

/// Every ledger row recorded against the order, oldest first.
pub async fn fetch_ledger_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, SqliteDatabaseError> {
    let sql = format!("SELECT {LEDGER_COLUMNS} FROM payment_ledger WHERE order_id = $1 ORDER BY id ASC");
    let rows = sqlx::query_as::<_, LedgerEntry>(&sql).bind(order_id).fetch_all(conn).await?;
    Ok(rows)
}
