//! Shared utilities: venue environment selection and logging setup.

mod environment;

pub use environment::{AlpacaEnvironment, ParseEnvironmentError, ENVIRONMENT_VAR};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG`; defaults to `info` when unset or invalid. Calling this more than
/// once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
