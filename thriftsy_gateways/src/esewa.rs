use std::fmt::Display;

use log::*;
use serde::{Deserialize, Serialize};
use thriftsy_common::Paisa;

use crate::{
    config::EsewaConfig,
    signature::{canonical_message, sign, signed_field_names, verify},
    CallbackFields,
};

/// The fields eSewa expects to be signed on a payment request, in order.
pub const ESEWA_SIGNED_FIELDS: &str = "total_amount,transaction_uuid,product_code";

/// The form the buyer's browser must POST to eSewa to start a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsewaForm {
    pub endpoint: String,
    pub fields: EsewaFormFields,
}

/// The ePay v2 form fields. Amounts are rupee strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EsewaFormFields {
    pub amount: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub transaction_uuid: String,
    pub product_code: String,
    pub product_service_charge: String,
    pub product_delivery_charge: String,
    pub success_url: String,
    pub failure_url: String,
    pub signed_field_names: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EsewaStatus {
    Complete,
    Pending,
    Ambiguous,
    NotFound,
    Canceled,
    FullRefund,
    PartialRefund,
    Other(String),
}

impl From<&str> for EsewaStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" | "COMPLETED" => Self::Complete,
            "PENDING" => Self::Pending,
            "AMBIGUOUS" => Self::Ambiguous,
            "NOT_FOUND" => Self::NotFound,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "FULL_REFUND" => Self::FullRefund,
            "PARTIAL_REFUND" => Self::PartialRefund,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl Display for EsewaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Complete => "complete",
            Self::Pending => "pending",
            Self::Ambiguous => "ambiguous",
            Self::NotFound => "not_found",
            Self::Canceled => "canceled",
            Self::FullRefund => "full_refund",
            Self::PartialRefund => "partial_refund",
            Self::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

impl EsewaStatus {
    /// eSewa reports `PENDING` and `AMBIGUOUS` for payments that may still complete.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Ambiguous)
    }
}

/// The interesting parts of a (signature-checked) eSewa callback.
#[derive(Debug, Clone)]
pub struct EsewaCallback {
    pub transaction_uuid: Option<String>,
    pub transaction_code: Option<String>,
    pub status: EsewaStatus,
    pub total_amount: Option<Paisa>,
}

impl EsewaCallback {
    /// Success redirects don't always carry a status; the signature alone vouches for those.
    pub fn from_fields(fields: &CallbackFields) -> Self {
        let status = fields.non_empty("status").map(EsewaStatus::from).unwrap_or(EsewaStatus::Complete);
        let total_amount = fields.non_empty("total_amount").or_else(|| fields.non_empty("amount")).and_then(|s| {
            s.parse::<Paisa>().map_err(|e| warn!("💳️ eSewa sent an unreadable amount. {e}")).ok()
        });
        Self {
            transaction_uuid: fields.non_empty("transaction_uuid").map(String::from),
            transaction_code: fields.non_empty("transaction_code").map(String::from),
            status,
            total_amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EsewaClient {
    config: EsewaConfig,
}

impl EsewaClient {
    pub fn new(config: EsewaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EsewaConfig {
        &self.config
    }

    /// Builds the signed form for a payment of `total` with the given per-attempt `transaction_uuid`.
    pub fn build_form(&self, total: Paisa, transaction_uuid: &str, success_url: &str, failure_url: &str) -> EsewaForm {
        let mut fields = EsewaFormFields {
            amount: total.to_rupee_string(),
            tax_amount: "0".to_string(),
            total_amount: total.to_rupee_string(),
            transaction_uuid: transaction_uuid.to_string(),
            product_code: self.config.merchant_code.clone(),
            product_service_charge: "0".to_string(),
            product_delivery_charge: "0".to_string(),
            success_url: success_url.to_string(),
            failure_url: failure_url.to_string(),
            signed_field_names: ESEWA_SIGNED_FIELDS.to_string(),
            signature: String::default(),
        };
        let message = format!(
            "total_amount={},transaction_uuid={},product_code={}",
            fields.total_amount, fields.transaction_uuid, fields.product_code
        );
        fields.signature = sign(self.config.secret_key.reveal(), &message);
        debug!("💳️ Built eSewa form for {transaction_uuid} ({total}) in {}", self.config.environment);
        EsewaForm { endpoint: self.config.environment.form_url().to_string(), fields }
    }

    /// Checks the signature on a callback over exactly the fields the callback claims were signed.
    ///
    /// Returns `false` if the payload does not name any signed fields.
    pub fn signature_is_valid(&self, fields: &CallbackFields) -> bool {
        let names = signed_field_names(fields.get("signed_field_names").unwrap_or_default());
        if names.is_empty() {
            debug!("💳️ eSewa callback has no signed_field_names");
            return false;
        }
        let message = canonical_message(fields, &names);
        let signature = fields.get("signature").unwrap_or_default();
        verify(self.config.secret_key.reveal(), &message, signature)
    }
}
