//! Tracing setup. Logs always go to stderr; stdout belongs to the stdio transport.

use crate::config::LogFormat;
use crate::error::{AdapterError, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `default_level` when set.
///
/// # Errors
///
/// Returns an error if `default_level` is not a valid filter or a subscriber is already set.
pub fn init(default_level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| AdapterError::Config(format!("invalid log level '{default_level}': {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| AdapterError::Startup(format!("failed to install tracing subscriber: {e}")))
}
