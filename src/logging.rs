//! Logging setup
//!
//! Installs a `tracing_subscriber` formatter driven by [`LoggingConfig`].
//! `RUST_LOG`, when set, takes precedence over the configured filter.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// Safe to call more than once: if a subscriber is already installed the
/// existing one is kept.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized - keeping existing subscriber");
    }
}
