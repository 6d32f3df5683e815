//! Tracing setup for hosts embedding the engine.

use crate::config::LogLevel;
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

pub type LogHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Install the global subscriber. `RUST_LOG` seeds the filter, falling back to
/// `debug`; the returned handle swaps the level later.
pub fn init_tracing() -> Result<LogHandle> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .try_init()
        .context("Installing tracing subscriber")?;
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    Ok(handle)
}

pub fn set_log_level(handle: &LogHandle, level: LogLevel) {
    let level = level.as_filter_str();
    let parsed = filter_for(level);
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"))
}
