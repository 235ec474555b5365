//! Strategy runtime: runs the bar poller, order book poller and trade stream against a
//! shared signal engine and forwards every signal to a caller-supplied sink.
//!
//! ```text
//! BarPoller ────────┐
//! OrderBookPoller ──┼──> SignalEngine ──> SignalSink
//! TradeStream ──────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use strategy_runner::{StrategyConfig, StrategyOrchestrator};
//!
//! let config = StrategyConfig::from_env()?;
//! let mut orchestrator = StrategyOrchestrator::from_config(&config, credentials, metrics)?;
//! orchestrator.start(Arc::new(|signal| println!("{signal}"))).await?;
//! // ...
//! orchestrator.stop().await?;
//! ```

mod config;
mod error;
mod orchestrator;

pub use config::StrategyConfig;
pub use error::RunnerError;
pub use orchestrator::{SignalSink, StrategyOrchestrator};
