//! # Thriftsy engine public API
//!
//! The APIs are split by concern so that a caller only needs a backend that implements the traits it actually uses.
//!
//! * [`order_flow_api`] creates orders, applies buyer and gateway-driven state transitions, and marks orders paid.
//! * [`history_api`] serves the read models: buyer order history, seller sales and the audit trail.
//! * [`ledger_api`] appends to and lists the payment ledger.
//!
//! Every API is constructed by handing it a database backend:
//!
//! ```rust,ignore
//! use thriftsy_engine::{HistoryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/thriftsy_store.db", 5).await?;
//! let api = HistoryApi::new(db);
//! let orders = api.orders_for_buyer(buyer_id).await?;
//! ```
pub mod errors;
pub mod history_api;
pub mod ledger_api;
pub mod order_flow_api;
pub mod order_objects;
