// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Build the event filter: `RUST_LOG` when set, otherwise `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, Box<dyn Error + Send + Sync>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// The subscriber writes to stdout, either as one JSON object per event
/// (for log aggregation) or in the human-readable format for local runs.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive or a global
/// subscriber is already installed.
///
/// # Examples
///
/// ```
/// use siteedge::config::LogFormat;
/// use siteedge::logging::init_subscriber;
///
/// init_subscriber(LogFormat::Pretty, "info").expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(
    format: LogFormat,
    level: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
}
