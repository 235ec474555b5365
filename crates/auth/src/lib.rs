//! API credentials for the Alpaca trading and market data APIs.
//!
//! Credentials are explicit values handed to every client at construction time. The
//! secret key is wrapped in `SecretString` so it never shows up in logs.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::ApiCredentials;
//!
//! let credentials = ApiCredentials::new("PK...".into(), "secret".into())?;
//! for (name, value) in credentials.auth_headers() {
//!     request = request.header(name, value);
//! }
//! ```

mod credentials;
mod error;

pub use credentials::{ApiCredentials, API_KEY_HEADER, API_SECRET_HEADER};
pub use error::AuthError;
