//! Generic REST client infrastructure.
//!
//! A thin wrapper around `reqwest` with:
//!
//! - Consistent error handling via `RestError`
//! - JSON response deserialization
//! - Header injection for authentication
//! - A bounded per-request timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use rest_client::RestClient;
//!
//! let client = RestClient::new("https://data.alpaca.markets", Duration::from_secs(10))?;
//! let bars: LatestBarsResponse = client
//!     .get("/v1beta3/crypto/us/latest/bars", Some("symbols=BTC%2FUSD"), Some(&headers))
//!     .await?;
//! ```

mod client;
mod error;

pub use client::RestClient;
pub use error::RestError;
