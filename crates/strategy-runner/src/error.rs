//! Strategy runner error types.

use alpaca_rest::AlpacaRestError;
use auth::AuthError;
use connector_core::ConnectorError;
use thiserror::Error;

/// Errors that can occur while configuring or running the strategy.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Missing or invalid credentials.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// REST client construction or catalog lookup failed.
    #[error("REST API error: {0}")]
    RestApi(#[from] AlpacaRestError),

    /// A source failed to start or terminated with an error.
    #[error("source error: {0}")]
    Source(#[from] ConnectorError),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `start` called on a running orchestrator.
    #[error("strategy already running")]
    AlreadyRunning,
}
