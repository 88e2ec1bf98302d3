use log::*;
use serde_json::Value;
use thriftsy_engine::{
    db_types::{Order, Paisa, PaymentMethod},
    OrderFlowApi,
    OrderManagement,
};
use thriftsy_gateways::{correlation_token, CallbackPayload, EsewaCallback, EsewaClient, EsewaStatus};

use super::{Confirmation, ConfirmationOutcome, GatewayAdapter, Initiation};
use crate::errors::ServerError;

/// eSewa ePay v2. The buyer's browser posts a signed form to eSewa, and eSewa redirects back with a signed payload.
pub struct EsewaAdapter<'a, B> {
    client: &'a EsewaClient,
    orders: &'a OrderFlowApi<B>,
    success_url: &'a str,
    failure_url: &'a str,
}

impl<'a, B> EsewaAdapter<'a, B> {
    pub fn new(client: &'a EsewaClient, orders: &'a OrderFlowApi<B>, success_url: &'a str, failure_url: &'a str) -> Self {
        Self { client, orders, success_url, failure_url }
    }
}

impl<'a, B> GatewayAdapter for EsewaAdapter<'a, B>
where B: OrderManagement
{
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Esewa
    }

    async fn initiate(&self, order: &Order, amount: Paisa, product_label: &str) -> Result<Initiation, ServerError> {
        if !self.client.config().is_configured() {
            return Err(ServerError::ConfigurationError("eSewa merchant code or secret key is missing".into()));
        }
        let token = correlation_token(order.id.value());
        self.orders.attach_gateway_token(order.id, PaymentMethod::Esewa, &token).await?;
        let form = self.client.build_form(amount, &token, self.success_url, self.failure_url);
        info!("💳️ eSewa payment {token} for order {} ({product_label}, {amount}) ready", order.id);
        Ok(Initiation::FormPost(form))
    }

    async fn confirm(&self, payload: CallbackPayload) -> Result<Confirmation, ServerError> {
        let fields = match payload.decode() {
            Ok(f) => f,
            Err(e) => {
                warn!("💳️ Could not decode an eSewa callback. {e}");
                return Ok(Confirmation::failed("invalid-payload", Value::Null));
            },
        };
        let raw = fields.to_json();
        if !self.client.signature_is_valid(&fields) {
            warn!("💳️ eSewa callback failed the signature check. Payload: {raw}");
            return Ok(Confirmation::failed("signature", raw));
        }
        let callback = EsewaCallback::from_fields(&fields);
        let token = match callback.transaction_uuid.as_deref() {
            Some(t) => t,
            None => {
                warn!("💳️ Signed eSewa callback without a transaction_uuid");
                return Ok(Confirmation::failed("unknown-order", raw).with_amount(callback.total_amount));
            },
        };
        let order = self.orders.fetch_order_by_gateway_token(PaymentMethod::Esewa, token).await?;
        let confirmation = Confirmation::failed("unknown-order", raw)
            .with_gateway_txn_id(Some(token.to_string()))
            .with_amount(callback.total_amount);
        let order = match order {
            Some(o) => o,
            None => {
                warn!("💳️ eSewa confirmed {token}, but no order carries that token");
                return Ok(confirmation);
            },
        };
        let outcome = match &callback.status {
            EsewaStatus::Complete => ConfirmationOutcome::Verified,
            s if s.is_in_progress() => ConfirmationOutcome::Pending(s.to_string()),
            s => ConfirmationOutcome::Failed(s.to_string()),
        };
        debug!("💳️ eSewa callback for order {} ({token}): {outcome}", order.id);
        Ok(Confirmation { outcome, ..confirmation.with_order_id(Some(order.id)) })
    }
}
