use thiserror::Error;
use tokio::time::Duration;

/// Errors surfaced by the provider client.
///
/// `Rejected` is the provider saying no to a well-formed request; everything
/// else went wrong on the way to or from the API.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Timeout after {0:?} waiting for the provider")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid JSON body: {0}")]
    Json(String),
    #[error("Provider rejected the request: {0:?}")]
    Rejected(Vec<String>),
}

impl PushError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PushError::Timeout(_) | PushError::Network(_))
    }
}
