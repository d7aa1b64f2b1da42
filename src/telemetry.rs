//! Logging setup

use crate::error::{Error, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it is set.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    installed.map_err(|e| Error::Telemetry(e.to_string()))
}

/// Filter built from a level or directive string such as `info` or
/// `payment_simulator=debug`.
fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| Error::Telemetry(e.to_string()))
}
