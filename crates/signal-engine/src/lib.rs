//! Rolling per-symbol indicators and BUY/SELL/HOLD classification.

mod engine;
pub mod indicators;

pub use engine::{SignalEngine, BUFFER_CAPACITY, LONG_WINDOW, SHORT_WINDOW};
