//! Alpaca REST API clients.
//!
//! - **`AlpacaDataClient`**: latest bars, latest order books and paginated historical
//!   bars from the crypto market data API
//! - **`AlpacaTradingClient`**: the crypto asset catalog from the trading API
//!
//! Both authenticate with header-carried credentials and share the bounded request
//! timeout of the underlying `RestClient`.
//!
//! # Example
//!
//! ```rust,ignore
//! use alpaca_rest::AlpacaDataClient;
//! use auth::ApiCredentials;
//!
//! let credentials = ApiCredentials::from_env()?;
//! let client = AlpacaDataClient::new(credentials, AlpacaEnvironment::Paper)?;
//! let bars = client.get_latest_bars(&["BTC/USD".to_string()]).await?;
//! ```

mod client;
mod error;
mod responses;
mod trading;

pub use client::{encode_symbols, AlpacaDataClient, HistoricalBarsRequest, REQUEST_TIMEOUT};
pub use error::AlpacaRestError;
pub use responses::{Asset, HistoricalBarsResponse, LatestBarsResponse, LatestOrderBooksResponse};
pub use trading::AlpacaTradingClient;
