//! # Database management and control.
//!
//! This module provides the interfaces that define the contracts of the reconciliation engine database *backends*.
//!
//! * [`OrderManagement`] stores orders, their items and per-seller sales records, and applies audited state changes.
//! * [`ProductAvailability`] claims and releases products with conditional updates.
//! * [`AuditManagement`] reads the order audit trail.
//! * [`PaymentLedgerManagement`] appends to and reads the payment ledger.
mod audit_management;
mod data_objects;
mod order_management;
mod payment_ledger;
mod product_availability;

pub use audit_management::AuditManagement;
pub use data_objects::{InsertOrderResult, NewOrderRecord};
pub use order_management::OrderManagement;
pub use payment_ledger::PaymentLedgerManagement;
pub use product_availability::ProductAvailability;
use thiserror::Error;

use crate::db_types::OrderId;

/// Backend-agnostic storage errors.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
