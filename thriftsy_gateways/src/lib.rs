//! Wire-level support for the two payment gateways used by the marketplace.
//!
//! * [`signature`] holds the HMAC-SHA256 primitive and the canonical `name=value,...` message builder that eSewa
//!   uses for both request and callback signatures.
//! * [`CallbackPayload`] normalises the different shapes a gateway callback can arrive in.
//! * [`EsewaClient`] builds signed ePay v2 form posts and checks signed callbacks.
//! * [`KhaltiApi`] talks to the Khalti ePayment REST API (initiate and lookup).
mod config;
mod error;
mod esewa;
mod khalti;
mod payload;

pub mod signature;

pub use config::{EsewaConfig, EsewaEnvironment, KhaltiConfig};
pub use error::GatewayError;
pub use esewa::{EsewaCallback, EsewaClient, EsewaForm, EsewaFormFields, EsewaStatus, ESEWA_SIGNED_FIELDS};
pub use khalti::{KhaltiApi, KhaltiInitiateRequest, KhaltiInitiateResponse, KhaltiLookupResponse, KhaltiPaymentStatus};
pub use payload::{CallbackFields, CallbackPayload};

/// Builds a per-attempt correlation token for an order, e.g. `order-42-1718000000000`. The millisecond suffix keeps the
/// token unique across retries, which both gateways require.
pub fn correlation_token(order_id: i64) -> String {
    format!("order-{order_id}-{}", chrono::Utc::now().timestamp_millis())
}
