use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Which snapshot feed a poll belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Bars,
    OrderBooks,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::Bars => write!(f, "bars"),
            FeedKind::OrderBooks => write!(f, "orderbooks"),
        }
    }
}

/// Thread-safe metrics collector for the ingestion sources and the signal engine.
#[derive(Debug)]
pub struct IngestMetrics {
    // Counters
    bar_polls: AtomicU64,
    order_book_polls: AtomicU64,
    poll_errors: AtomicU64,
    trades_received: AtomicU64,
    messages_received: AtomicU64,
    parse_errors: AtomicU64,
    websocket_errors: AtomicU64,
    reconnect_attempts: AtomicU64,
    signals_emitted: AtomicU64,

    // Timestamps
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_bar_time: Option<Instant>,
    last_trade_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    pub fn new() -> Self {
        Self {
            bar_polls: AtomicU64::new(0),
            order_book_polls: AtomicU64::new(0),
            poll_errors: AtomicU64::new(0),
            trades_received: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            websocket_errors: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            signals_emitted: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_bar_time: None,
                last_trade_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_polls(&self, kind: FeedKind) {
        match kind {
            FeedKind::Bars => {
                self.bar_polls.fetch_add(1, Ordering::Relaxed);
                self.inner.write().last_bar_time = Some(Instant::now());
            }
            FeedKind::OrderBooks => {
                self.order_book_polls.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn inc_poll_errors(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_trades_received(&self) {
        self.trades_received.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_trade_time = Some(Instant::now());
    }

    pub fn inc_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_parse_errors(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_websocket_errors(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_signals_emitted(&self) {
        self.signals_emitted.fetch_add(1, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn polls(&self, kind: FeedKind) -> u64 {
        match kind {
            FeedKind::Bars => self.bar_polls.load(Ordering::Relaxed),
            FeedKind::OrderBooks => self.order_book_polls.load(Ordering::Relaxed),
        }
    }

    pub fn poll_errors(&self) -> u64 {
        self.poll_errors.load(Ordering::Relaxed)
    }

    pub fn trades_received(&self) -> u64 {
        self.trades_received.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn websocket_errors(&self) -> u64 {
        self.websocket_errors.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn signals_emitted(&self) -> u64 {
        self.signals_emitted.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_bar(&self) -> Option<f64> {
        self.inner
            .read()
            .last_bar_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_trade(&self) -> Option<f64> {
        self.inner
            .read()
            .last_trade_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bar_polls: self.polls(FeedKind::Bars),
            order_book_polls: self.polls(FeedKind::OrderBooks),
            poll_errors: self.poll_errors(),
            trades_received: self.trades_received(),
            messages_received: self.messages_received(),
            parse_errors: self.parse_errors(),
            websocket_errors: self.websocket_errors(),
            reconnect_attempts: self.reconnect_attempts(),
            signals_emitted: self.signals_emitted(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_bar: self.secs_since_last_bar(),
            secs_since_last_trade: self.secs_since_last_trade(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub bar_polls: u64,
    pub order_book_polls: u64,
    pub poll_errors: u64,
    pub trades_received: u64,
    pub messages_received: u64,
    pub parse_errors: u64,
    pub websocket_errors: u64,
    pub reconnect_attempts: u64,
    pub signals_emitted: u64,
    pub uptime_secs: f64,
    pub secs_since_last_bar: Option<f64>,
    pub secs_since_last_trade: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Bars are arriving.
    Healthy,
    /// Bar data is stale.
    Degraded,
    /// No bars for an extended period.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Threshold in seconds for considering data stale (degraded).
    const STALE_THRESHOLD_SECS: f64 = 30.0;
    /// Threshold in seconds for considering the pipeline unhealthy.
    const UNHEALTHY_THRESHOLD_SECS: f64 = 60.0;

    /// Determine the health status from bar freshness.
    ///
    /// Signals are bar-driven, so a silent trade stream alone does not degrade health.
    pub fn health_status(&self) -> HealthStatus {
        let age = self.secs_since_last_bar.unwrap_or(self.uptime_secs);

        if age > Self::UNHEALTHY_THRESHOLD_SECS {
            HealthStatus::Unhealthy
        } else if age > Self::STALE_THRESHOLD_SECS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingest Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Bar polls:           {}", self.bar_polls)?;
        writeln!(f, "Order book polls:    {}", self.order_book_polls)?;
        writeln!(f, "Poll errors:         {}", self.poll_errors)?;
        writeln!(f, "Trades received:     {}", self.trades_received)?;
        writeln!(f, "Messages received:   {}", self.messages_received)?;
        writeln!(f, "Parse errors:        {}", self.parse_errors)?;
        writeln!(f, "WebSocket errors:    {}", self.websocket_errors)?;
        writeln!(f, "Reconnect attempts:  {}", self.reconnect_attempts)?;
        writeln!(f, "Signals emitted:     {}", self.signals_emitted)?;
        if let Some(secs) = self.secs_since_last_bar {
            writeln!(f, "Since last bar:      {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<IngestMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(IngestMetrics::new())
}
