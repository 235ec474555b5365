//! Shared plumbing for the market data sources: errors, callbacks, configuration and the
//! task handle that owns a source's background loop.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use alpaca_rest::AlpacaRestError;
use common::AlpacaEnvironment;
use model::{Symbol, TradeTick};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("REST error: {0}")]
    Rest(#[from] AlpacaRestError),

    #[error("Symbol catalog error: {0}")]
    Catalog(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Callback invoked with every successful snapshot refresh, keyed by symbol.
pub type SnapshotCallback<T> = Box<dyn Fn(HashMap<Symbol, T>) + Send + Sync>;

/// Callback invoked once per decoded trade, in arrival order.
pub type TradeCallback = Box<dyn Fn(TradeTick) + Send + Sync>;

/// Configuration for a snapshot poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between the end of one poll and the start of the next.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Configuration for the trade stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Fixed wait between a disconnect and the next connection attempt.
    pub reconnect_delay: Duration,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
}

impl StreamConfig {
    pub fn for_environment(environment: AlpacaEnvironment) -> Self {
        Self {
            url: environment.crypto_stream_url().to_string(),
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: AlpacaEnvironment::default().crypto_stream_url().to_string(),
            reconnect_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Resolves once shutdown has been requested or the sender is gone.
///
/// Cancel-safe, so it can sit in a `select!` arm next to I/O.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// Owns one source's background task and its shutdown signal.
///
/// `stop` is idempotent and returns only once the task has exited, so no callback can
/// fire after it returns. Dropping the handle requests shutdown without waiting.
#[derive(Debug)]
pub struct SourceHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<Result<(), ConnectorError>>>,
}

impl SourceHandle {
    /// Spawn `run` as the source's background task.
    ///
    /// `run` must watch a receiver subscribed from `shutdown_tx`.
    pub fn spawn<F>(name: &'static str, shutdown_tx: watch::Sender<bool>, run: F) -> Self
    where
        F: Future<Output = Result<(), ConnectorError>> + Send + 'static,
    {
        debug!(source = name, "Spawning source task");
        Self {
            name,
            shutdown_tx,
            task: Some(tokio::spawn(run)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the background task is still alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal shutdown without waiting.
    pub fn request_stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Signal shutdown and wait for the task to exit.
    ///
    /// Returns the error the loop terminated with, if any. Later calls return `Ok(())`.
    pub async fn stop(&mut self) -> Result<(), ConnectorError> {
        self.request_stop();

        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(ConnectorError::Task(e.to_string())),
        };
        info!(source = self.name, "Source stopped");
        result
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.request_stop();
        }
    }
}
