//! Payment gateway adapters.
//!
//! Each gateway is wrapped in an adapter implementing [`GatewayAdapter`]. `initiate` registers a payment attempt for an
//! order and tells the storefront where to send the buyer; `confirm` turns whatever the gateway sent back into a
//! [`Confirmation`] that the payment routes act on. Adapters never change an order's payment state themselves.
//!
//! [`PaymentGateways`] holds the configured gateway clients and hands out the adapter for a payment method.
mod esewa;
mod khalti;

use std::fmt::Display;

pub use esewa::EsewaAdapter;
pub use khalti::KhaltiAdapter;
use serde::Serialize;
use serde_json::Value;
use thriftsy_engine::{
    db_types::{Order, OrderId, Paisa, PaymentMethod},
    OrderFlowApi,
    OrderManagement,
};
use thriftsy_gateways::{CallbackPayload, EsewaClient, EsewaConfig, EsewaForm, GatewayError, KhaltiApi, KhaltiConfig};

use crate::{config::ServerConfig, errors::ServerError};

/// What the storefront must do to hand the buyer over to the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Initiation {
    /// POST `fields` to `endpoint` from the buyer's browser.
    FormPost(EsewaForm),
    /// Send the buyer to `payment_url`.
    Redirect { payment_url: String, pidx: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The gateway vouches for the payment.
    Verified,
    /// The payment may still complete. Carries the gateway's status.
    Pending(String),
    /// The payment did not go through, or the confirmation could not be trusted. Carries a short reason code.
    Failed(String),
}

impl Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Pending(s) => write!(f, "pending ({s})"),
            Self::Failed(s) => write!(f, "failed ({s})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub outcome: ConfirmationOutcome,
    /// The order the confirmation was correlated with, if any.
    pub order_id: Option<OrderId>,
    pub gateway_txn_id: Option<String>,
    pub amount: Option<Paisa>,
    /// What the gateway sent, kept for the ledger.
    pub raw: Value,
}

impl Confirmation {
    pub fn failed<S: Into<String>>(reason: S, raw: Value) -> Self {
        Self {
            outcome: ConfirmationOutcome::Failed(reason.into()),
            order_id: None,
            gateway_txn_id: None,
            amount: None,
            raw,
        }
    }

    pub fn with_order_id(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_gateway_txn_id(mut self, txn: Option<String>) -> Self {
        self.gateway_txn_id = txn;
        self
    }

    pub fn with_amount(mut self, amount: Option<Paisa>) -> Self {
        self.amount = amount;
        self
    }
}

#[allow(async_fn_in_trait)]
pub trait GatewayAdapter {
    fn method(&self) -> PaymentMethod;

    /// Starts a payment of `amount` for `order`, storing the attempt's correlation token on the order.
    async fn initiate(&self, order: &Order, amount: Paisa, product_label: &str) -> Result<Initiation, ServerError>;

    /// Interprets a callback. Untrustworthy or unresolvable callbacks are `Failed` outcomes, not errors. An error
    /// means the gateway or the database could not be reached.
    async fn confirm(&self, payload: CallbackPayload) -> Result<Confirmation, ServerError>;
}

//-------------------------------------------------  PaymentGateways  --------------------------------------------------
/// The configured gateway clients, shared by all workers.
#[derive(Debug, Clone)]
pub struct PaymentGateways {
    esewa: EsewaClient,
    khalti: KhaltiApi,
    esewa_success_url: String,
    esewa_failure_url: String,
    khalti_return_url: String,
    website_url: String,
}

impl PaymentGateways {
    pub fn new(
        esewa: EsewaConfig,
        khalti: KhaltiConfig,
        server_base_url: &str,
        client_base_url: &str,
    ) -> Result<Self, GatewayError> {
        let server_base_url = server_base_url.trim_end_matches('/');
        Ok(Self {
            esewa: EsewaClient::new(esewa),
            khalti: KhaltiApi::new(khalti)?,
            esewa_success_url: format!("{server_base_url}/api/payments/callback/esewa"),
            esewa_failure_url: format!("{server_base_url}/api/payments/callback/esewa/failure"),
            khalti_return_url: format!("{server_base_url}/api/payments/callback/khalti"),
            website_url: client_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, GatewayError> {
        Self::new(config.esewa.clone(), config.khalti.clone(), &config.server_base_url, &config.client_base_url)
    }

    /// The adapter for `method`. Cash on delivery and bank transfers have no gateway.
    pub fn for_method<'a, B>(
        &'a self,
        method: PaymentMethod,
        orders: &'a OrderFlowApi<B>,
    ) -> Result<Gateway<'a, B>, ServerError> {
        match method {
            PaymentMethod::Esewa => Ok(Gateway::Esewa(EsewaAdapter::new(
                &self.esewa,
                orders,
                &self.esewa_success_url,
                &self.esewa_failure_url,
            ))),
            PaymentMethod::Khalti => {
                Ok(Gateway::Khalti(KhaltiAdapter::new(&self.khalti, orders, &self.khalti_return_url, &self.website_url)))
            },
            PaymentMethod::Cod | PaymentMethod::BankTransfer => {
                Err(ServerError::UnsupportedPaymentMethod(method.to_string()))
            },
        }
    }
}

/// One of the supported gateways.
pub enum Gateway<'a, B> {
    Esewa(EsewaAdapter<'a, B>),
    Khalti(KhaltiAdapter<'a, B>),
}

impl<'a, B> GatewayAdapter for Gateway<'a, B>
where B: OrderManagement
{
    fn method(&self) -> PaymentMethod {
        match self {
            Self::Esewa(a) => a.method(),
            Self::Khalti(a) => a.method(),
        }
    }

    async fn initiate(&self, order: &Order, amount: Paisa, product_label: &str) -> Result<Initiation, ServerError> {
        match self {
            Self::Esewa(a) => a.initiate(order, amount, product_label).await,
            Self::Khalti(a) => a.initiate(order, amount, product_label).await,
        }
    }

    async fn confirm(&self, payload: CallbackPayload) -> Result<Confirmation, ServerError> {
        match self {
            Self::Esewa(a) => a.confirm(payload).await,
            Self::Khalti(a) => a.confirm(payload).await,
        }
    }
}
