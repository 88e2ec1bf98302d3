use std::{env, io::Write};

use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;
use thriftsy_common::{helpers::parse_boolean_flag, Secret};
use thriftsy_gateways::{EsewaConfig, KhaltiConfig};

use crate::errors::ServerError;

const DEFAULT_TSY_HOST: &str = "127.0.0.1";
const DEFAULT_TSY_PORT: u16 = 5000;
const DEFAULT_CLIENT_BASE_URL: &str = "http://localhost:8080";
/// HS256 keys shorter than this are refused.
const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// The public root of this server, used to build the gateway callback URLs, e.g. `https://api.thriftsy.com.np`
    pub server_base_url: String,
    /// The storefront root that buyers are redirected to after a payment, e.g. `https://thriftsy.com.np`
    pub client_base_url: String,
    /// When false, orders may be placed without an access token.
    pub require_buyer_identity: bool,
    pub esewa: EsewaConfig,
    pub khalti: KhaltiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TSY_HOST.to_string(),
            port: DEFAULT_TSY_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            server_base_url: format!("http://localhost:{DEFAULT_TSY_PORT}"),
            client_base_url: DEFAULT_CLIENT_BASE_URL.to_string(),
            require_buyer_identity: true,
            esewa: EsewaConfig::default(),
            khalti: KhaltiConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TSY_HOST").ok().unwrap_or_else(|| DEFAULT_TSY_HOST.into());
        let port = env::var("TSY_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TSY_PORT. {e} Using the default, {DEFAULT_TSY_PORT}, instead."
                    );
                    DEFAULT_TSY_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TSY_PORT);
        let database_url = env::var("TSY_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TSY_DATABASE_URL is not set. Please set it to the URL for the Thriftsy database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let server_base_url = env::var("TSY_SERVER_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                let url = format!("http://localhost:{port}");
                info!("🪛️ TSY_SERVER_BASE_URL is not set. Gateway callbacks will be sent to {url}.");
                url
            });
        let client_base_url = env::var("TSY_CLIENT_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                info!("🪛️ TSY_CLIENT_BASE_URL is not set. Buyers will be redirected to {DEFAULT_CLIENT_BASE_URL}.");
                DEFAULT_CLIENT_BASE_URL.to_string()
            });
        let require_buyer_identity = parse_boolean_flag(env::var("TSY_REQUIRE_BUYER_IDENTITY").ok(), true);
        if !require_buyer_identity {
            warn!("🪛️ Guest checkout is enabled. Orders can be placed without an access token.");
        }
        let esewa = EsewaConfig::new_from_env_or_default();
        let khalti = KhaltiConfig::new_from_env_or_default();
        Self { host, port, database_url, auth, server_base_url, client_base_url, require_buyer_identity, esewa, khalti }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The shared HS256 secret that access tokens are signed with. Tokens are issued by the marketplace's account
    /// service; this server only verifies them.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate in \
             production like this, since no token issued elsewhere will be accepted. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the TSY_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("TSY_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [TSY_JWT_SECRET]")))?;
        if secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "TSY_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self::new(&secret))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of the configuration that request handlers need. Secrets stay out of it so that it can be handed to
/// every handler.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub client_base_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { client_base_url: config.client_base_url.clone() }
    }

    /// Where the buyer lands after a verified payment.
    pub fn order_page(&self, order_id: i64) -> String {
        format!("{}/order/{order_id}", self.client_base_url)
    }

    /// Where the buyer lands while the gateway still reports the payment as in progress.
    pub fn pending_page(&self, order_id: i64, method: &str) -> String {
        format!("{}/order/{order_id}?payment=pending&method={}", self.client_base_url, urlencoding::encode(method))
    }

    pub fn failure_page(&self, method: &str, reason: &str, txn: Option<&str>) -> String {
        let mut url = format!(
            "{}/failure?method={}&reason={}",
            self.client_base_url,
            urlencoding::encode(method),
            urlencoding::encode(reason)
        );
        if let Some(txn) = txn {
            url.push_str("&txn=");
            url.push_str(&urlencoding::encode(txn));
        }
        url
    }
}
