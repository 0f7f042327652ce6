//! Tracing subscriber bootstrap.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    error::{ChaincodeError, ChaincodeResult},
    settings::{LogFormat, LoggingConfig},
};

/// Installs the global tracing subscriber described by `config`.
///
/// `RUST_LOG`, when set and valid, takes precedence over the configured
/// filter. The configured filter is still parsed so a bad setting is never
/// silently ignored.
///
/// # Errors
///
/// Returns [`ChaincodeError::Config`] if the filter does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> ChaincodeResult<()> {
    let configured = EnvFilter::try_new(&config.filter).map_err(|e| {
        ChaincodeError::config(format!("invalid logging filter {:?}: {e}", config.filter))
    })?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed
        .map_err(|e| ChaincodeError::config(format!("cannot install tracing subscriber: {e}")))
}
