//! Thriftsy Order & Payment Reconciliation Engine
//!
//! This library holds the order lifecycle for the Thriftsy secondhand marketplace: idempotent order creation with
//! per-seller allocation, atomic product claims, audited state transitions, and the payment ledger that records what
//! the payment gateways reported. It knows nothing about HTTP or about any particular gateway's wire format.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. Callers should use the public
//!    APIs rather than the database directly; the exception is the data types in [`db_types`], which are public.
//! 2. The public engine API ([`mod@engine_api`]): [`OrderFlowApi`], [`HistoryApi`] and [`LedgerApi`]. Each is generic
//!    over the backend traits it needs.
//!
//! The order flow also publishes [`events`] when orders are created, paid for, or cancelled.
mod db;

pub mod allocation;
pub mod db_types;
mod engine_api;
pub mod events;
pub mod helpers;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AuditManagement,
    InsertOrderResult,
    NewOrderRecord,
    OrderManagement,
    PaymentLedgerManagement,
    ProductAvailability,
    StoreError,
};
pub use engine_api::{
    errors::OrderFlowError,
    history_api::HistoryApi,
    ledger_api::{LedgerApi, DEFAULT_LEDGER_PAGE},
    order_flow_api::{check_transition, OrderFlowApi, MAX_TRANSITION_ATTEMPTS},
    order_objects,
};
