use log::*;
use serde_json::Value;
use thriftsy_engine::{
    db_types::{Order, Paisa, PaymentMethod},
    OrderFlowApi,
    OrderManagement,
};
use thriftsy_gateways::{
    correlation_token,
    CallbackPayload,
    GatewayError,
    KhaltiApi,
    KhaltiInitiateRequest,
    KhaltiPaymentStatus,
};

use super::{Confirmation, ConfirmationOutcome, GatewayAdapter, Initiation};
use crate::errors::ServerError;

/// Khalti ePayment. Payments are registered server to server; the return redirect only carries the `pidx`, so every
/// confirmation is a lookup against the Khalti API.
pub struct KhaltiAdapter<'a, B> {
    api: &'a KhaltiApi,
    orders: &'a OrderFlowApi<B>,
    return_url: &'a str,
    website_url: &'a str,
}

impl<'a, B> KhaltiAdapter<'a, B> {
    pub fn new(api: &'a KhaltiApi, orders: &'a OrderFlowApi<B>, return_url: &'a str, website_url: &'a str) -> Self {
        Self { api, orders, return_url, website_url }
    }
}

impl<'a, B> GatewayAdapter for KhaltiAdapter<'a, B>
where B: OrderManagement
{
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Khalti
    }

    async fn initiate(&self, order: &Order, amount: Paisa, product_label: &str) -> Result<Initiation, ServerError> {
        if !self.api.config().is_configured() {
            return Err(ServerError::ConfigurationError("Khalti secret key is missing".into()));
        }
        let request = KhaltiInitiateRequest {
            return_url: self.return_url.to_string(),
            website_url: self.website_url.to_string(),
            amount,
            purchase_order_id: correlation_token(order.id.value()),
            purchase_order_name: product_label.to_string(),
        };
        let response = self.api.initiate(&request).await?;
        self.orders.attach_gateway_token(order.id, PaymentMethod::Khalti, &response.pidx).await?;
        Ok(Initiation::Redirect { payment_url: response.payment_url, pidx: response.pidx })
    }

    async fn confirm(&self, payload: CallbackPayload) -> Result<Confirmation, ServerError> {
        let fields = match payload.decode() {
            Ok(f) => f,
            Err(e) => {
                warn!("💳️ Could not decode a Khalti callback. {e}");
                return Ok(Confirmation::failed("invalid-payload", Value::Null));
            },
        };
        let pidx = match fields.non_empty("pidx") {
            Some(p) => p.to_string(),
            None => return Ok(Confirmation::failed("missing-pidx", fields.to_json())),
        };
        // The redirect itself is unsigned. Only the lookup is trusted.
        let lookup = match self.api.lookup(&pidx).await {
            Ok(l) => l,
            Err(GatewayError::RemoteError { status, message }) => {
                warn!("💳️ Khalti lookup for {pidx} was refused. {status}: {message}");
                let reason = format!("lookup-{status}");
                return Ok(Confirmation::failed(reason, fields.to_json()).with_gateway_txn_id(Some(pidx)));
            },
            Err(e) => return Err(e.into()),
        };
        let raw = serde_json::to_value(&lookup).unwrap_or_else(|_| fields.to_json());
        let order = self.orders.fetch_order_by_gateway_token(PaymentMethod::Khalti, &pidx).await?;
        let txn = lookup.transaction_id.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| pidx.clone());
        let confirmation = Confirmation::failed("unknown-order", raw)
            .with_gateway_txn_id(Some(txn))
            .with_amount(lookup.total_amount);
        let order = match order {
            Some(o) => o,
            None => {
                warn!("💳️ Khalti reports {pidx} as {}, but no order carries that pidx", lookup.status);
                return Ok(confirmation);
            },
        };
        let outcome = match &lookup.status {
            KhaltiPaymentStatus::Completed => ConfirmationOutcome::Verified,
            s if s.is_in_progress() => ConfirmationOutcome::Pending(s.to_string().to_lowercase()),
            s => ConfirmationOutcome::Failed(s.to_string().to_lowercase()),
        };
        debug!("💳️ Khalti payment {pidx} for order {}: {outcome}", order.id);
        Ok(Confirmation { outcome, ..confirmation.with_order_id(Some(order.id)) })
    }
}
