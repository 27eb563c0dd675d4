//! Tracing subscriber setup for binaries and tests embedding the adapter
//!
//! The library itself only emits `tracing` events. Applications call
//! [`init`] once at startup; the filter comes from `RUST_LOG` and falls back
//! to [`DEFAULT_LEVEL`].

use color_eyre::eyre::eyre;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install colored error reports and a console subscriber.
///
/// Fails if either has already been installed in this process.
pub fn init() -> color_eyre::Result<()> {
    init_with_level(DEFAULT_LEVEL)
}

/// Same as [`init`] with a custom fallback filter
pub fn init_with_level(level: &str) -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .try_init()
        .map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}

/// Route events to the test harness output. Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}
