//! Alpaca REST API error types.

use auth::AuthError;
use rest_client::RestError;
use thiserror::Error;

/// Errors that can occur when interacting with the Alpaca REST APIs.
#[derive(Debug, Error)]
pub enum AlpacaRestError {
    /// REST client error (network, timeout, status, body).
    #[error("REST client error: {0}")]
    Rest(#[from] RestError),

    /// Credential configuration error.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A request argument was rejected before it was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AlpacaRestError {
    /// Transient errors are reported and retried at the caller's normal cadence.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rest(rest_err) => rest_err.is_transient(),
            Self::Auth(_) | Self::InvalidRequest(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(AlpacaRestError::Rest(RestError::Timeout).is_transient());
        assert!(!AlpacaRestError::Rest(RestError::RequestBuild("x".into())).is_transient());
        assert!(!AlpacaRestError::Auth(AuthError::MissingCredential("api key")).is_transient());
        assert!(!AlpacaRestError::InvalidRequest("x".into()).is_transient());
    }
}
