//! Alpaca environment configuration.
//!
//! Market data is served from the same hosts for both environments; only the trading API
//! (used here for the asset catalog) differs between live and paper accounts.

use std::fmt;
use std::str::FromStr;

/// Variable selecting the account environment.
pub const ENVIRONMENT_VAR: &str = "ALPACA_ENVIRONMENT";

/// Alpaca account environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlpacaEnvironment {
    /// Live trading account.
    Live,
    /// Paper trading account.
    #[default]
    Paper,
}

impl AlpacaEnvironment {
    /// Trading API base URL (assets, account).
    pub fn trading_base_url(&self) -> &'static str {
        match self {
            Self::Live => "https://api.alpaca.markets",
            Self::Paper => "https://paper-api.alpaca.markets",
        }
    }

    /// Market data REST base URL.
    pub fn data_base_url(&self) -> &'static str {
        "https://data.alpaca.markets"
    }

    /// WebSocket URL for the crypto market data stream.
    pub fn crypto_stream_url(&self) -> &'static str {
        "wss://stream.data.alpaca.markets/v1beta3/crypto/us"
    }

    /// Load environment from the `ALPACA_ENVIRONMENT` env var.
    ///
    /// Returns `Paper` if not set, and an error if set to an unknown value.
    pub fn from_env() -> Result<Self, ParseEnvironmentError> {
        Self::from_env_value(std::env::var(ENVIRONMENT_VAR).ok().as_deref())
    }

    /// Parse an optional `ALPACA_ENVIRONMENT` value. Absent means `Paper`.
    pub fn from_env_value(raw: Option<&str>) -> Result<Self, ParseEnvironmentError> {
        raw.map_or(Ok(Self::default()), str::parse)
    }
}

impl fmt::Display for AlpacaEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Paper => write!(f, "paper"),
        }
    }
}

impl FromStr for AlpacaEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" | "production" | "prod" => Ok(Self::Live),
            "paper" | "sandbox" | "test" => Ok(Self::Paper),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid environment '{}', expected 'live' or 'paper'",
            self.0
        )
    }
}

impl std::error::Error for ParseEnvironmentError {}
