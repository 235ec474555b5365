//! Wires the three market data sources into one signal engine.

use std::collections::HashMap;
use std::sync::Arc;

use alpaca_rest::{AlpacaDataClient, AlpacaTradingClient};
use auth::ApiCredentials;
use connector_alpaca::{
    LatestBars, LatestOrderBooks, SnapshotPoller, SnapshotSource, SymbolCatalog,
    TradeStreamClient,
};
use connector_core::{ConnectorError, PollerConfig, SourceHandle, StreamConfig};
use metrics::SharedMetrics;
use model::{Bar, OrderBook, StrategySignal, Symbol};
use parking_lot::RwLock;
use signal_engine::SignalEngine;
use tracing::{debug, info, warn};

use crate::config::StrategyConfig;
use crate::error::RunnerError;

/// Receives every signal the engine emits.
pub type SignalSink = Arc<dyn Fn(StrategySignal) + Send + Sync>;

/// Owns the bar poller, order book poller and trade stream as one unit.
///
/// Sources deliver into a shared [`SignalEngine`]; signals go to the sink passed to
/// [`start`](Self::start). `stop` waits for all three sources, so nothing is delivered
/// after it returns.
pub struct StrategyOrchestrator<B = LatestBars, O = LatestOrderBooks>
where
    B: SnapshotSource<Snapshot = Bar>,
    O: SnapshotSource<Snapshot = OrderBook>,
{
    symbols: Vec<Symbol>,
    bar_poller: SnapshotPoller<B>,
    order_book_poller: SnapshotPoller<O>,
    stream: TradeStreamClient,
    catalog: Option<Arc<dyn SymbolCatalog>>,
    engine: Arc<SignalEngine>,
    latest: Arc<RwLock<HashMap<Symbol, StrategySignal>>>,
    metrics: SharedMetrics,
    handles: Vec<SourceHandle>,
}

impl StrategyOrchestrator {
    /// Build the venue clients and sources for `config`.
    ///
    /// # Errors
    /// Fails if an HTTP client cannot be built.
    pub fn from_config(
        config: &StrategyConfig,
        credentials: ApiCredentials,
        metrics: SharedMetrics,
    ) -> Result<Self, RunnerError> {
        let data = Arc::new(AlpacaDataClient::new(credentials.clone(), config.environment)?);

        let bar_poller = SnapshotPoller::new(
            LatestBars::new(data.clone()),
            PollerConfig {
                interval: config.bar_interval,
            },
            metrics.clone(),
        );
        let order_book_poller = SnapshotPoller::new(
            LatestOrderBooks::new(data),
            PollerConfig {
                interval: config.order_book_interval,
            },
            metrics.clone(),
        );
        let stream = TradeStreamClient::new(
            StreamConfig {
                reconnect_delay: config.reconnect_delay,
                ..StreamConfig::for_environment(config.environment)
            },
            credentials.clone(),
            metrics.clone(),
        );

        let orchestrator = Self::new(
            config.symbols.clone(),
            bar_poller,
            order_book_poller,
            stream,
            metrics,
        );

        if config.symbols.is_empty() {
            let trading = AlpacaTradingClient::new(credentials, config.environment)?;
            Ok(orchestrator.with_catalog(Arc::new(trading)))
        } else {
            Ok(orchestrator)
        }
    }
}

impl<B, O> StrategyOrchestrator<B, O>
where
    B: SnapshotSource<Snapshot = Bar>,
    O: SnapshotSource<Snapshot = OrderBook>,
{
    /// Assemble from prebuilt sources. An empty `symbols` requires a catalog.
    pub fn new(
        symbols: Vec<Symbol>,
        bar_poller: SnapshotPoller<B>,
        order_book_poller: SnapshotPoller<O>,
        stream: TradeStreamClient,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            symbols,
            bar_poller,
            order_book_poller,
            stream,
            catalog: None,
            engine: Arc::new(SignalEngine::new()),
            latest: Arc::new(RwLock::new(HashMap::new())),
            metrics,
            handles: Vec::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn SymbolCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn engine(&self) -> &Arc<SignalEngine> {
        &self.engine
    }

    /// Symbols the sources run with. Resolved from the catalog on first start if empty.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn latest_signal(&self, symbol: &str) -> Option<StrategySignal> {
        self.latest.read().get(symbol).cloned()
    }

    pub fn latest_signals(&self) -> HashMap<Symbol, StrategySignal> {
        self.latest.read().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Launch all three sources with the same symbol set.
    ///
    /// If any source fails to start, the ones already running are stopped.
    pub async fn start(&mut self, sink: SignalSink) -> Result<(), RunnerError> {
        if self.is_running() {
            return Err(RunnerError::AlreadyRunning);
        }

        if self.symbols.is_empty() {
            self.symbols = self.resolve_symbols().await?;
        }
        let symbols = self.symbols.clone();
        info!(symbols = ?symbols, "Starting strategy");

        let bars = {
            let engine = self.engine.clone();
            let latest = self.latest.clone();
            let metrics = self.metrics.clone();
            self.bar_poller
                .start(
                    Some(symbols.clone()),
                    Box::new(move |bars: HashMap<Symbol, Bar>| {
                        for (symbol, bar) in bars {
                            if let Some(signal) = engine.ingest_bar(&symbol, bar) {
                                debug!(
                                    symbol = %signal.symbol,
                                    signal = %signal.signal_type,
                                    confidence = signal.confidence,
                                    price = %signal.price,
                                    imbalance = signal.order_book_imbalance,
                                    volatility = signal.volatility,
                                    "Signal"
                                );
                                latest.write().insert(symbol, signal.clone());
                                metrics.inc_signals_emitted();
                                sink(signal);
                            }
                        }
                    }),
                )
                .await?
        };
        self.handles.push(bars);

        let engine = self.engine.clone();
        let books = self
            .order_book_poller
            .start(
                Some(symbols.clone()),
                Box::new(move |books: HashMap<Symbol, OrderBook>| {
                    for (symbol, book) in books {
                        engine.ingest_order_book(&symbol, book);
                    }
                }),
            )
            .await;
        match books {
            Ok(handle) => self.handles.push(handle),
            Err(e) => {
                let _ = self.stop().await;
                return Err(e.into());
            }
        }

        let engine = self.engine.clone();
        let trades = self
            .stream
            .start(symbols, Box::new(move |trade| engine.ingest_trade(trade)));
        self.handles.push(trades);

        Ok(())
    }

    /// Stop every source and wait for each to exit.
    ///
    /// Safe to call repeatedly. Returns the first error a source terminated with.
    pub async fn stop(&mut self) -> Result<(), RunnerError> {
        if self.handles.is_empty() {
            return Ok(());
        }

        info!("Stopping strategy");
        for handle in &self.handles {
            handle.request_stop();
        }

        let mut first_error: Option<ConnectorError> = None;
        for mut handle in self.handles.drain(..) {
            if let Err(e) = handle.stop().await {
                warn!(source = handle.name(), error = %e, "Source ended with error");
                first_error.get_or_insert(e);
            }
        }

        info!(signals = self.metrics.signals_emitted(), "Strategy stopped");
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn resolve_symbols(&self) -> Result<Vec<Symbol>, RunnerError> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            RunnerError::Config("no symbols configured and no catalog available".into())
        })?;
        let symbols = catalog.tradable_symbols().await?;
        if symbols.is_empty() {
            return Err(RunnerError::Config("catalog returned no tradable symbols".into()));
        }
        info!(count = symbols.len(), "Resolved tradable symbols");
        Ok(symbols)
    }
}
