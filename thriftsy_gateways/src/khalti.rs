use std::{fmt::Display, sync::Arc};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thriftsy_common::Paisa;

use crate::{config::KhaltiConfig, GatewayError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiInitiateRequest {
    pub return_url: String,
    pub website_url: String,
    /// Amount in paisa
    pub amount: Paisa,
    pub purchase_order_id: String,
    pub purchase_order_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiInitiateResponse {
    pub pidx: String,
    pub payment_url: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KhaltiPaymentStatus {
    Completed,
    Pending,
    Initiated,
    Refunded,
    PartiallyRefunded,
    Expired,
    UserCanceled,
    Other(String),
}

impl From<String> for KhaltiPaymentStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Self::Completed,
            "pending" => Self::Pending,
            "initiated" => Self::Initiated,
            "refunded" => Self::Refunded,
            "partially refunded" => Self::PartiallyRefunded,
            "expired" => Self::Expired,
            "user canceled" | "user cancelled" => Self::UserCanceled,
            _ => Self::Other(value),
        }
    }
}

impl From<KhaltiPaymentStatus> for String {
    fn from(value: KhaltiPaymentStatus) -> Self {
        value.to_string()
    }
}

impl Display for KhaltiPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::Initiated => "Initiated",
            Self::Refunded => "Refunded",
            Self::PartiallyRefunded => "Partially Refunded",
            Self::Expired => "Expired",
            Self::UserCanceled => "User canceled",
            Self::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

impl KhaltiPaymentStatus {
    /// `Pending` and `Initiated` payments have not reached a final state yet.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Initiated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KhaltiLookupResponse {
    pub pidx: String,
    /// Amount in paisa
    pub total_amount: Option<Paisa>,
    pub status: KhaltiPaymentStatus,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub fee: Option<Paisa>,
    #[serde(default)]
    pub refunded: bool,
}

/// A thin client for the Khalti ePayment API. Every request carries the merchant secret in the `Authorization` header
/// and is bounded by the configured timeout. Transport failures surface as [`GatewayError::Unavailable`] and are never
/// retried here.
#[derive(Clone)]
pub struct KhaltiApi {
    config: KhaltiConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for KhaltiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KhaltiApi ({})", self.config.base_url)
    }
}

impl KhaltiApi {
    pub fn new(config: KhaltiConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Key {}", config.secret_key.reveal()))
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &KhaltiConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("💳️ Sending Khalti request: {url}");
        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            warn!("💳️ Khalti request failed: {e}");
            GatewayError::from(e)
        })?;
        if response.status().is_success() {
            trace!("💳️ Khalti request successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(GatewayError::from)?;
            warn!("💳️ Khalti returned an error. {status}: {message}");
            Err(GatewayError::RemoteError { status, message })
        }
    }

    /// Registers a payment with Khalti, returning the `pidx` correlation token and the hosted payment page URL.
    pub async fn initiate(&self, request: &KhaltiInitiateRequest) -> Result<KhaltiInitiateResponse, GatewayError> {
        debug!("💳️ Initiating Khalti payment for {} ({})", request.purchase_order_id, request.amount);
        let result = self.post::<KhaltiInitiateResponse, _>("/epayment/initiate/", request).await?;
        info!("💳️ Khalti payment {} registered for {}", result.pidx, request.purchase_order_id);
        Ok(result)
    }

    /// Asks Khalti for the authoritative status of the payment identified by `pidx`.
    pub async fn lookup(&self, pidx: &str) -> Result<KhaltiLookupResponse, GatewayError> {
        #[derive(Serialize)]
        struct LookupRequest<'a> {
            pidx: &'a str,
        }
        debug!("💳️ Looking up Khalti payment {pidx}");
        let result = self.post::<KhaltiLookupResponse, _>("/epayment/lookup/", &LookupRequest { pidx }).await?;
        info!("💳️ Khalti payment {pidx} is {}", result.status);
        Ok(result)
    }
}
