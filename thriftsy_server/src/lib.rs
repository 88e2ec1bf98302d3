//! # Thriftsy server
//! This crate hosts the HTTP front end of the Thriftsy order and payment reconciliation engine. It is responsible for:
//! * Accepting checkouts from the storefront and exposing buyers' and sellers' order history.
//! * Starting eSewa and Khalti payments, and turning the gateways' callbacks into verified payments.
//! * Writing every payment attempt to the ledger, and letting the storefront reconcile a payment after the fact.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders`, `/api/orders/sold`, `/api/orders/{id}` and `/api/orders/{id}/audit`. See [routes].
//! * `/api/payments/initiate/{method}`, `/api/payments/callback/{method}[/failure]`, `/api/payments/verify` and
//!   `/api/payments/ledger`. See [payment_routes].
//!
//! All amounts in request and response bodies are integers in paisa.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod hooks;
pub mod integrations;
pub mod middleware;
pub mod payment_routes;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
