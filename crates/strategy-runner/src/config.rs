use std::time::Duration;

use common::{AlpacaEnvironment, ENVIRONMENT_VAR};
use model::Symbol;

use crate::error::RunnerError;

const SYMBOLS_VAR: &str = "STRATEGY_SYMBOLS";
const BAR_INTERVAL_VAR: &str = "STRATEGY_BAR_INTERVAL_MS";
const ORDER_BOOK_INTERVAL_VAR: &str = "STRATEGY_ORDERBOOK_INTERVAL_MS";

/// Configuration for a strategy run.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    /// Symbols shared by all three sources. Empty means every tradable crypto asset.
    pub symbols: Vec<Symbol>,
    pub bar_interval: Duration,
    pub order_book_interval: Duration,
    pub environment: AlpacaEnvironment,
    /// Delay between a stream disconnect and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC/USD".to_string(), "ETH/USD".to_string()],
            bar_interval: Duration::from_secs(1),
            order_book_interval: Duration::from_secs(1),
            environment: AlpacaEnvironment::default(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl StrategyConfig {
    /// Defaults overridden by `STRATEGY_SYMBOLS`, `STRATEGY_BAR_INTERVAL_MS`,
    /// `STRATEGY_ORDERBOOK_INTERVAL_MS` and `ALPACA_ENVIRONMENT`.
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RunnerError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(SYMBOLS_VAR) {
            config.symbols = parse_symbols(&raw);
        }
        if let Some(raw) = lookup(BAR_INTERVAL_VAR) {
            config.bar_interval = parse_millis(BAR_INTERVAL_VAR, &raw)?;
        }
        if let Some(raw) = lookup(ORDER_BOOK_INTERVAL_VAR) {
            config.order_book_interval = parse_millis(ORDER_BOOK_INTERVAL_VAR, &raw)?;
        }
        config.environment = AlpacaEnvironment::from_env_value(lookup(ENVIRONMENT_VAR).as_deref())
            .map_err(|e| RunnerError::Config(format!("{ENVIRONMENT_VAR}: {e}")))?;

        Ok(config)
    }
}

fn parse_symbols(raw: &str) -> Vec<Symbol> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_millis(var: &str, raw: &str) -> Result<Duration, RunnerError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(RunnerError::Config(format!(
            "{var} must be a positive number of milliseconds, got {raw:?}"
        ))),
        Ok(ms) => Ok(Duration::from_millis(ms)),
    }
}
