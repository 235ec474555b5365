//! Secure API credential management.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// Header carrying the API key id.
pub const API_KEY_HEADER: &str = "APCA-API-KEY-ID";

/// Header carrying the API secret.
pub const API_SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

/// API credentials for authenticated requests.
///
/// The secret key is wrapped in `SecretString` which prevents accidental Debug/Display
/// printing and zeroes memory on drop.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    secret_key: SecretString,
}

impl ApiCredentials {
    /// Create credentials from explicit values.
    ///
    /// # Errors
    /// Returns `AuthError::MissingCredential` if either value is empty or blank.
    pub fn new(api_key: String, secret_key: String) -> Result<Self, AuthError> {
        if api_key.trim().is_empty() {
            return Err(AuthError::MissingCredential("api key"));
        }
        if secret_key.trim().is_empty() {
            return Err(AuthError::MissingCredential("secret key"));
        }

        Ok(Self {
            api_key,
            secret_key: SecretString::from(secret_key),
        })
    }

    /// Load credentials from environment variables.
    ///
    /// Looks for `ALPACA_API_KEY` and `ALPACA_SECRET_KEY`, after loading a `.env` file
    /// if one is present.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("ALPACA_API_KEY")
            .map_err(|_| AuthError::MissingEnvVar("ALPACA_API_KEY".into()))?;

        let secret_key = std::env::var("ALPACA_SECRET_KEY")
            .map_err(|_| AuthError::MissingEnvVar("ALPACA_SECRET_KEY".into()))?;

        Self::new(api_key, secret_key)
    }

    /// Get the API key (public, safe to log).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Expose the secret key.
    ///
    /// Only for request headers and the stream auth message. Never log the result.
    pub fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }

    /// Header pairs that authenticate a REST request.
    pub fn auth_headers(&self) -> [(&'static str, &str); 2] {
        [
            (API_KEY_HEADER, self.api_key()),
            (API_SECRET_HEADER, self.expose_secret()),
        ]
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = ApiCredentials::new("my_api_key".into(), "my_secret".into()).unwrap();
        assert_eq!(creds.api_key(), "my_api_key");
        assert_eq!(creds.expose_secret(), "my_secret");
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = ApiCredentials::new("".into(), "secret".into()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential("api key")));

        let err = ApiCredentials::new("key".into(), "   ".into()).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential("secret key")));
    }

    #[test]
    fn test_auth_headers() {
        let creds = ApiCredentials::new("key".into(), "secret".into()).unwrap();
        let headers = creds.auth_headers();
        assert_eq!(headers[0], ("APCA-API-KEY-ID", "key"));
        assert_eq!(headers[1], ("APCA-API-SECRET-KEY", "secret"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds =
            ApiCredentials::new("my_api_key".into(), "super_secret_key".into()).unwrap();
        let debug_str = format!("{:?}", creds);

        assert!(debug_str.contains("my_api_key"));
        assert!(!debug_str.contains("super_secret_key"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
