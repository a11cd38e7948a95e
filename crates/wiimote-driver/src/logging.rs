//! Logging setup

use crate::config::LogConfig;
use crate::error::{DriverError, DriverResult};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn build_filter(config: &LogConfig) -> DriverResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| DriverError::Logging(format!("invalid level {:?}: {e}", config.level))),
    }
}

/// Installs the global `tracing` subscriber.
///
/// Fails if the level directive does not parse or a subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> DriverResult<()> {
    let env_filter = build_filter(config)?;
    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.show_target);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| DriverError::Logging(e.to_string()))?;

    info!(
        "Logging initialized - level: {}, ansi: {}, target: {}",
        config.level, config.ansi, config.show_target
    );
    Ok(())
}
