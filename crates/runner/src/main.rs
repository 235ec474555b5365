use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alpaca_rest::{AlpacaDataClient, AlpacaTradingClient, HistoricalBarsRequest};
use auth::ApiCredentials;
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use common::AlpacaEnvironment;
use connector_alpaca::{BarPoller, LatestBars, LatestOrderBooks, OrderBookPoller};
use connector_core::{wait_for_shutdown, PollerConfig};
use metrics::{create_metrics, SharedMetrics};
use model::{Bar, OrderBook, StrategySignal, Symbol};
use strategy_runner::{StrategyConfig, StrategyOrchestrator};
use tokio::sync::watch;
use tracing::{error, info};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Crypto market data ingestion and signal generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the signal strategy until Ctrl+C
    Strategy {
        /// Symbols to trade, e.g. BTC/USD (defaults to STRATEGY_SYMBOLS or BTC/USD ETH/USD)
        symbols: Vec<Symbol>,
    },
    /// Poll and print the latest bars
    Bars {
        symbols: Vec<Symbol>,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Poll and print the top of the latest order books
    Orderbooks {
        symbols: Vec<Symbol>,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// List crypto assets
    Assets {
        /// Include assets that are not tradable
        #[arg(long)]
        all: bool,
    },
    /// Download historical bars to a JSON file
    History {
        #[arg(long, default_value = "BTC/USD")]
        symbol: Symbol,
        /// Bar timeframe, e.g. 1Min, 1Hour, 1Day
        #[arg(long, default_value = "1Hour")]
        timeframe: String,
        /// Days back from now
        #[arg(long, default_value_t = 7)]
        days: i64,
        /// Upper bound on pages followed
        #[arg(long, default_value_t = 50)]
        max_pages: usize,
        /// Output directory
        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    common::init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), BoxError> {
    let credentials = ApiCredentials::from_env()?;
    let environment = AlpacaEnvironment::from_env()?;
    info!(environment = %environment, "Loaded credentials");

    match command {
        Command::Strategy { symbols } => run_strategy(credentials, symbols).await,
        Command::Bars {
            symbols,
            interval_ms,
        } => run_bars(credentials, environment, symbols, interval_ms).await,
        Command::Orderbooks {
            symbols,
            interval_ms,
        } => run_orderbooks(credentials, environment, symbols, interval_ms).await,
        Command::Assets { all } => run_assets(credentials, environment, all).await,
        Command::History {
            symbol,
            timeframe,
            days,
            max_pages,
            out_dir,
        } => {
            let end = Utc::now();
            let request = HistoricalBarsRequest {
                symbol,
                timeframe,
                start: history_start(end, days)?,
                end,
                max_pages,
            };
            run_history(credentials, environment, request, out_dir).await
        }
    }
}

/// Start of a window reaching `days` back from `end`.
fn history_start(end: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, BoxError> {
    if days <= 0 {
        return Err(format!("--days must be positive, got {days}").into());
    }
    TimeDelta::try_days(days)
        .and_then(|span| end.checked_sub_signed(span))
        .ok_or_else(|| format!("--days {days} is out of range").into())
}

async fn run_strategy(credentials: ApiCredentials, symbols: Vec<Symbol>) -> Result<(), BoxError> {
    let mut config = StrategyConfig::from_env()?;
    if !symbols.is_empty() {
        config.symbols = symbols;
    }

    let metrics = create_metrics();
    let mut orchestrator = StrategyOrchestrator::from_config(&config, credentials, metrics.clone())?;

    orchestrator
        .start(Arc::new(|signal: StrategySignal| println!("{}", signal)))
        .await?;

    let health = spawn_health_reporter(metrics.clone());
    wait_for_ctrl_c().await;

    let result = orchestrator.stop().await;
    health.stop().await;

    for (symbol, signal) in orchestrator.latest_signals() {
        info!(symbol = %symbol, signal = %signal.signal_type, "Last signal");
    }
    println!("\n{}", metrics.snapshot());
    info!("Shutdown complete");

    Ok(result?)
}

fn default_symbols(symbols: Vec<Symbol>) -> Vec<Symbol> {
    if symbols.is_empty() {
        StrategyConfig::default().symbols
    } else {
        symbols
    }
}

async fn run_bars(
    credentials: ApiCredentials,
    environment: AlpacaEnvironment,
    symbols: Vec<Symbol>,
    interval_ms: u64,
) -> Result<(), BoxError> {
    let data = Arc::new(AlpacaDataClient::new(credentials, environment)?);
    let metrics = create_metrics();
    let poller: BarPoller = BarPoller::new(
        LatestBars::new(data),
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
        },
        metrics.clone(),
    );

    let mut handle = poller
        .start(
            Some(default_symbols(symbols)),
            Box::new(|bars: HashMap<Symbol, Bar>| {
                for (symbol, bar) in bars {
                    println!(
                        "{} | {} | o: {} h: {} l: {} c: {} v: {}",
                        bar.timestamp.to_rfc3339(),
                        symbol,
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    );
                }
            }),
        )
        .await?;

    wait_for_ctrl_c().await;
    handle.stop().await?;
    println!("\n{}", metrics.snapshot());
    Ok(())
}

async fn run_orderbooks(
    credentials: ApiCredentials,
    environment: AlpacaEnvironment,
    symbols: Vec<Symbol>,
    interval_ms: u64,
) -> Result<(), BoxError> {
    let data = Arc::new(AlpacaDataClient::new(credentials, environment)?);
    let metrics = create_metrics();
    let poller: OrderBookPoller = OrderBookPoller::new(
        LatestOrderBooks::new(data),
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
        },
        metrics.clone(),
    );

    let mut handle = poller
        .start(
            Some(default_symbols(symbols)),
            Box::new(|books: HashMap<Symbol, OrderBook>| {
                for (symbol, book) in books {
                    let bid = book
                        .best_bid()
                        .map(|l| format!("{} x {}", l.price, l.size))
                        .unwrap_or_else(|| "-".to_string());
                    let ask = book
                        .best_ask()
                        .map(|l| format!("{} x {}", l.price, l.size))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} | {} | bid: {} | ask: {} | depth: {}/{}",
                        book.timestamp.to_rfc3339(),
                        symbol,
                        bid,
                        ask,
                        book.bids.len(),
                        book.asks.len()
                    );
                }
            }),
        )
        .await?;

    wait_for_ctrl_c().await;
    handle.stop().await?;
    println!("\n{}", metrics.snapshot());
    Ok(())
}

async fn run_assets(
    credentials: ApiCredentials,
    environment: AlpacaEnvironment,
    all: bool,
) -> Result<(), BoxError> {
    let client = AlpacaTradingClient::new(credentials, environment)?;
    let mut assets = client.list_crypto_assets().await?;
    if !all {
        assets.retain(|a| a.tradable);
    }
    assets.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    println!(
        "{:<12} {:<32} {:<8} {:<9} {:<10}",
        "SYMBOL", "NAME", "STATUS", "TRADABLE", "MARGINABLE"
    );
    for asset in &assets {
        println!(
            "{:<12} {:<32} {:<8} {:<9} {:<10}",
            asset.symbol, asset.name, asset.status, asset.tradable, asset.marginable
        );
    }
    println!("\n{} assets", assets.len());
    Ok(())
}

async fn run_history(
    credentials: ApiCredentials,
    environment: AlpacaEnvironment,
    request: HistoricalBarsRequest,
    out_dir: PathBuf,
) -> Result<(), BoxError> {
    let client = AlpacaDataClient::new(credentials, environment)?;
    info!(
        symbol = %request.symbol,
        timeframe = %request.timeframe,
        start = %request.start,
        end = %request.end,
        "Downloading historical bars"
    );
    let bars = client.get_historical_bars(&request).await?;

    std::fs::create_dir_all(&out_dir)?;
    let file_name = format!(
        "{}_{}_{}.json",
        request.symbol.replace('/', "-"),
        request.timeframe,
        uuid::Uuid::new_v4()
    );
    let path = out_dir.join(file_name);
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &bars)?;

    info!(bars = bars.len(), path = %path.display(), "Historical bars written");
    Ok(())
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

/// Background task logging a metrics summary every `HEALTH_LOG_INTERVAL`.
struct HealthReporter {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl HealthReporter {
    async fn stop(self) {
        self.shutdown_tx.send_replace(true);
        let _ = self.task.await;
    }
}

fn spawn_health_reporter(metrics: SharedMetrics) -> HealthReporter {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        bar_polls = snapshot.bar_polls,
                        order_book_polls = snapshot.order_book_polls,
                        trades = snapshot.trades_received,
                        signals = snapshot.signals_emitted,
                        errors = snapshot.poll_errors + snapshot.websocket_errors + snapshot.parse_errors,
                        reconnects = snapshot.reconnect_attempts,
                        "Health check"
                    );
                }
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
            }
        }
    });

    HealthReporter { shutdown_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_start() {
        let end = Utc::now();
        assert_eq!(history_start(end, 7).unwrap(), end - TimeDelta::days(7));
    }

    #[test]
    fn test_history_start_rejects_bad_days() {
        let end = Utc::now();
        for days in [0, -3, i64::MAX, 10_000_000_000] {
            assert!(history_start(end, days).is_err(), "days = {days}");
        }
    }
}
