//! Snapshot pollers for latest bars and latest order books.
//!
//! Both feeds share one loop: fetch, hand the result to the callback, sleep, repeat.
//! A poll never overlaps the previous callback, and once shutdown is requested no
//! further fetch is issued.

use std::collections::HashMap;
use std::sync::Arc;

use alpaca_rest::{AlpacaDataClient, AlpacaRestError, AlpacaTradingClient};
use async_trait::async_trait;
use connector_core::{
    wait_for_shutdown, ConnectorError, PollerConfig, SnapshotCallback, SourceHandle,
};
use metrics::{FeedKind, SharedMetrics};
use model::{Bar, OrderBook, Symbol};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// A latest-state endpoint that can be polled for a symbol set.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Send + 'static;

    /// Feed this source belongs to, for logging and metrics.
    const KIND: FeedKind;

    async fn fetch(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, Self::Snapshot>, AlpacaRestError>;
}

/// Resolves the tradable symbol set when a poller is started without one.
#[async_trait]
pub trait SymbolCatalog: Send + Sync {
    async fn tradable_symbols(&self) -> Result<Vec<Symbol>, AlpacaRestError>;
}

#[async_trait]
impl SymbolCatalog for AlpacaTradingClient {
    async fn tradable_symbols(&self) -> Result<Vec<Symbol>, AlpacaRestError> {
        AlpacaTradingClient::tradable_symbols(self).await
    }
}

/// Latest bars endpoint.
pub struct LatestBars {
    client: Arc<AlpacaDataClient>,
}

impl LatestBars {
    pub fn new(client: Arc<AlpacaDataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for LatestBars {
    type Snapshot = Bar;
    const KIND: FeedKind = FeedKind::Bars;

    async fn fetch(&self, symbols: &[Symbol]) -> Result<HashMap<Symbol, Bar>, AlpacaRestError> {
        self.client.get_latest_bars(symbols).await
    }
}

/// Latest order books endpoint.
pub struct LatestOrderBooks {
    client: Arc<AlpacaDataClient>,
}

impl LatestOrderBooks {
    pub fn new(client: Arc<AlpacaDataClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotSource for LatestOrderBooks {
    type Snapshot = OrderBook;
    const KIND: FeedKind = FeedKind::OrderBooks;

    async fn fetch(
        &self,
        symbols: &[Symbol],
    ) -> Result<HashMap<Symbol, OrderBook>, AlpacaRestError> {
        self.client.get_latest_orderbooks(symbols).await
    }
}

/// Periodically fetches snapshots from a `SnapshotSource`.
pub struct SnapshotPoller<S: SnapshotSource> {
    source: Arc<S>,
    config: PollerConfig,
    metrics: SharedMetrics,
    catalog: Option<Arc<dyn SymbolCatalog>>,
}

pub type BarPoller = SnapshotPoller<LatestBars>;

pub type OrderBookPoller = SnapshotPoller<LatestOrderBooks>;

impl<S: SnapshotSource> SnapshotPoller<S> {
    pub fn new(source: S, config: PollerConfig, metrics: SharedMetrics) -> Self {
        Self {
            source: Arc::new(source),
            config,
            metrics,
            catalog: None,
        }
    }

    /// Catalog used to resolve the symbol set when `start` is given none.
    pub fn with_catalog(mut self, catalog: Arc<dyn SymbolCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Start the polling loop.
    ///
    /// With `symbols == None` the tradable catalog is resolved once, here, and that set
    /// is used for the lifetime of the loop.
    ///
    /// # Errors
    /// Fails if the symbol set cannot be resolved.
    pub async fn start(
        &self,
        symbols: Option<Vec<Symbol>>,
        on_update: SnapshotCallback<S::Snapshot>,
    ) -> Result<SourceHandle, ConnectorError> {
        let symbols = match symbols {
            Some(symbols) => symbols,
            None => self.resolve_symbols().await?,
        };

        info!(
            feed = %S::KIND,
            symbols = ?symbols,
            interval_ms = self.config.interval.as_millis() as u64,
            "Starting snapshot poller"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = run_poller(
            self.source.clone(),
            symbols,
            self.config.clone(),
            on_update,
            self.metrics.clone(),
            shutdown_rx,
        );

        let name = match S::KIND {
            FeedKind::Bars => "bar-poller",
            FeedKind::OrderBooks => "orderbook-poller",
        };
        Ok(SourceHandle::spawn(name, shutdown_tx, run))
    }

    async fn resolve_symbols(&self) -> Result<Vec<Symbol>, ConnectorError> {
        let catalog = self.catalog.as_ref().ok_or_else(|| {
            ConnectorError::Catalog("no symbols given and no catalog configured".into())
        })?;

        let symbols = catalog
            .tradable_symbols()
            .await
            .map_err(|e| ConnectorError::Catalog(e.to_string()))?;

        info!(feed = %S::KIND, count = symbols.len(), "Resolved tradable symbols");
        Ok(symbols)
    }
}

async fn run_poller<S: SnapshotSource>(
    source: Arc<S>,
    symbols: Vec<Symbol>,
    config: PollerConfig,
    on_update: SnapshotCallback<S::Snapshot>,
    metrics: SharedMetrics,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ConnectorError> {
    loop {
        if *shutdown_rx.borrow() {
            info!(feed = %S::KIND, "Shutdown requested, exiting poller");
            return Ok(());
        }

        let result = tokio::select! {
            biased;

            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!(feed = %S::KIND, "Shutdown requested during fetch");
                return Ok(());
            }

            result = source.fetch(&symbols) => result,
        };

        match result {
            Ok(snapshots) => {
                metrics.inc_polls(S::KIND);
                on_update(snapshots);
            }
            Err(e) if e.is_transient() => {
                metrics.inc_poll_errors();
                warn!(feed = %S::KIND, error = %e, "Poll failed, retrying next interval");
            }
            Err(e) => {
                metrics.inc_poll_errors();
                error!(feed = %S::KIND, error = %e, "Poll failed with unclassified error, stopping poller");
                return Err(e.into());
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!(feed = %S::KIND, "Shutdown requested, exiting poller");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use metrics::create_metrics;
    use parking_lot::Mutex;
    use rest_client::RestError;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type FetchResult = Result<HashMap<Symbol, Bar>, AlpacaRestError>;

    /// Scripted source: pops queued results, then returns one bar per symbol.
    #[derive(Default)]
    struct MockSource {
        fetches: AtomicUsize,
        script: Mutex<VecDeque<FetchResult>>,
        seen_symbols: Mutex<Vec<Vec<Symbol>>>,
    }

    impl MockSource {
        fn scripted(results: Vec<FetchResult>) -> Self {
            Self {
                script: Mutex::new(results.into()),
                ..Self::default()
            }
        }
    }

    fn bar(close: rust_decimal::Decimal) -> Bar {
        Bar {
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            timestamp: Utc::now(),
            trade_count: None,
            vwap: None,
        }
    }

    #[async_trait]
    impl SnapshotSource for Arc<MockSource> {
        type Snapshot = Bar;
        const KIND: FeedKind = FeedKind::Bars;

        async fn fetch(&self, symbols: &[Symbol]) -> FetchResult {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            self.seen_symbols.lock().push(symbols.to_vec());
            if let Some(result) = self.script.lock().pop_front() {
                return result;
            }
            Ok(symbols
                .iter()
                .map(|s| (s.clone(), bar(rust_decimal::Decimal::from(n as u64))))
                .collect())
        }
    }

    struct MockCatalog {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SymbolCatalog for MockCatalog {
        async fn tradable_symbols(&self) -> Result<Vec<Symbol>, AlpacaRestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["BTC/USD".to_string(), "SOL/USD".to_string()])
        }
    }

    fn fast_config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(10),
        }
    }

    fn symbols() -> Option<Vec<Symbol>> {
        Some(vec!["BTC/USD".to_string()])
    }

    #[tokio::test]
    async fn test_delivers_updates_in_fetch_order() {
        let source = Arc::new(MockSource::default());
        let metrics = create_metrics();
        let poller = SnapshotPoller::new(source.clone(), fast_config(), metrics.clone());

        let closes = Arc::new(Mutex::new(Vec::new()));
        let sink = closes.clone();
        let mut handle = poller
            .start(
                symbols(),
                Box::new(move |bars: HashMap<Symbol, Bar>| {
                    sink.lock().push(bars["BTC/USD"].close);
                }),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.stop().await.unwrap();

        let closes = closes.lock().clone();
        assert!(closes.len() >= 2, "got {} updates", closes.len());
        assert!(closes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(metrics.polls(FeedKind::Bars), closes.len() as u64);
    }

    #[tokio::test]
    async fn test_no_fetch_after_stop() {
        let source = Arc::new(MockSource::default());
        let poller = SnapshotPoller::new(source.clone(), fast_config(), create_metrics());

        let mut handle = poller.start(symbols(), Box::new(|_| {})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        handle.stop().await.unwrap();

        let fetches = source.fetches.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches);

        // Second stop is a no-op.
        handle.stop().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test]
    async fn test_transient_error_keeps_polling() {
        let source = Arc::new(MockSource::scripted(vec![
            Err(AlpacaRestError::Rest(RestError::Timeout)),
            Err(AlpacaRestError::Rest(RestError::HttpError {
                status: 503,
                message: "unavailable".into(),
            })),
        ]));
        let metrics = create_metrics();
        let poller = SnapshotPoller::new(source.clone(), fast_config(), metrics.clone());

        let updates = Arc::new(AtomicUsize::new(0));
        let counter = updates.clone();
        let mut handle = poller
            .start(
                symbols(),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_running());
        handle.stop().await.unwrap();

        assert_eq!(metrics.poll_errors(), 2);
        assert!(updates.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_unclassified_error_stops_loop() {
        let source = Arc::new(MockSource::scripted(vec![Err(AlpacaRestError::Rest(
            RestError::RequestBuild("invalid url".into()),
        ))]));
        let poller = SnapshotPoller::new(source.clone(), fast_config(), create_metrics());

        let mut handle = poller.start(symbols(), Box::new(|_| {})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_running());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        let err = handle.stop().await.unwrap_err();
        assert!(matches!(err, ConnectorError::Rest(_)));
    }

    #[tokio::test]
    async fn test_catalog_resolved_once() {
        let source = Arc::new(MockSource::default());
        let catalog = Arc::new(MockCatalog {
            calls: AtomicUsize::new(0),
        });
        let poller = SnapshotPoller::new(source.clone(), fast_config(), create_metrics())
            .with_catalog(catalog.clone());

        let mut handle = poller.start(None, Box::new(|_| {})).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await.unwrap();

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        let seen = source.seen_symbols.lock();
        assert!(seen.len() >= 2);
        assert!(seen
            .iter()
            .all(|s| s == &vec!["BTC/USD".to_string(), "SOL/USD".to_string()]));
    }

    #[tokio::test]
    async fn test_missing_symbols_without_catalog() {
        let poller = SnapshotPoller::new(
            Arc::new(MockSource::default()),
            fast_config(),
            create_metrics(),
        );
        let err = poller.start(None, Box::new(|_| {})).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Catalog(_)));
    }
}
