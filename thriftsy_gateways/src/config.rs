use std::{fmt::Display, str::FromStr, time::Duration};

use log::*;
use thriftsy_common::Secret;

pub const ESEWA_SANDBOX_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";
pub const ESEWA_PRODUCTION_FORM_URL: &str = "https://epay.esewa.com.np/api/epay/main/v2/form";
pub const DEFAULT_KHALTI_BASE_URL: &str = "https://a.khalti.com/api/v2";
pub const DEFAULT_KHALTI_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EsewaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl EsewaEnvironment {
    pub fn form_url(&self) -> &'static str {
        match self {
            Self::Sandbox => ESEWA_SANDBOX_FORM_URL,
            Self::Production => ESEWA_PRODUCTION_FORM_URL,
        }
    }
}

impl FromStr for EsewaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" | "uat" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            _ => Err(format!("Unknown eSewa environment: {s}")),
        }
    }
}

impl Display for EsewaEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EsewaConfig {
    /// The `product_code` eSewa issues to the merchant.
    pub merchant_code: String,
    pub secret_key: Secret<String>,
    pub environment: EsewaEnvironment,
}

impl EsewaConfig {
    pub fn new(merchant_code: &str, secret_key: &str, environment: EsewaEnvironment) -> Self {
        Self { merchant_code: merchant_code.to_string(), secret_key: Secret::new(secret_key.to_string()), environment }
    }

    pub fn new_from_env_or_default() -> Self {
        let environment = std::env::var("TSY_ESEWA_ENV")
            .ok()
            .and_then(|s| {
                s.parse::<EsewaEnvironment>()
                    .map_err(|e| warn!("💳️ {e}. Falling back to the sandbox environment."))
                    .ok()
            })
            .unwrap_or_default();
        let merchant_code = std::env::var("TSY_ESEWA_MERCHANT_CODE").unwrap_or_else(|_| {
            warn!("💳️ TSY_ESEWA_MERCHANT_CODE not set, using the eSewa test merchant code EPAYTEST");
            "EPAYTEST".to_string()
        });
        let secret_key = Secret::new(std::env::var("TSY_ESEWA_SECRET_KEY").unwrap_or_else(|_| {
            warn!("💳️ TSY_ESEWA_SECRET_KEY not set. eSewa signatures will not match any real merchant account.");
            String::default()
        }));
        Self { merchant_code, secret_key, environment }
    }

    pub fn is_configured(&self) -> bool {
        !self.merchant_code.is_empty() && !self.secret_key.reveal().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct KhaltiConfig {
    pub secret_key: Secret<String>,
    /// The API root, without a trailing slash, e.g. `https://a.khalti.com/api/v2`
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for KhaltiConfig {
    fn default() -> Self {
        Self {
            secret_key: Secret::default(),
            base_url: DEFAULT_KHALTI_BASE_URL.to_string(),
            timeout: DEFAULT_KHALTI_TIMEOUT,
        }
    }
}

impl KhaltiConfig {
    pub fn new(secret_key: &str, base_url: &str, timeout: Duration) -> Self {
        Self {
            secret_key: Secret::new(secret_key.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let secret_key = Secret::new(std::env::var("TSY_KHALTI_SECRET_KEY").unwrap_or_else(|_| {
            warn!("💳️ TSY_KHALTI_SECRET_KEY not set. Khalti requests will be rejected by the gateway.");
            String::default()
        }));
        let base_url = std::env::var("TSY_KHALTI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                info!("💳️ TSY_KHALTI_BASE_URL not set, using {DEFAULT_KHALTI_BASE_URL}");
                DEFAULT_KHALTI_BASE_URL.to_string()
            });
        let timeout = std::env::var("TSY_KHALTI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("💳️ Invalid value for TSY_KHALTI_TIMEOUT_SECS ({s}): {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KHALTI_TIMEOUT);
        Self { secret_key, base_url, timeout }
    }

    pub fn is_configured(&self) -> bool {
        !self.secret_key.reveal().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn esewa_environments() {
        assert_eq!("Production".parse::<EsewaEnvironment>().unwrap(), EsewaEnvironment::Production);
        assert_eq!("sandbox".parse::<EsewaEnvironment>().unwrap().form_url(), ESEWA_SANDBOX_FORM_URL);
        assert!("staging".parse::<EsewaEnvironment>().is_err());
    }

    #[test]
    fn khalti_base_url_is_normalised() {
        let config = KhaltiConfig::new("key", "http://localhost:1234/api/v2/", Duration::from_secs(1));
        assert_eq!(config.base_url, "http://localhost:1234/api/v2");
        assert!(config.is_configured());
        assert!(!KhaltiConfig::default().is_configured());
    }
}
