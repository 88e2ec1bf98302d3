use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The payment gateway could not be reached: {0}")]
    Unavailable(String),
    #[error("Gateway request failed. Error {status}. {message}")]
    RemoteError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Invalid callback payload: {0}")]
    InvalidPayload(String),
    #[error("Gateway is not configured: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Transport failures (timeouts, refused connections, DNS) are the only errors the end user can fix by retrying.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::JsonError(e.to_string())
        } else if e.is_builder() {
            Self::Initialization(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}
