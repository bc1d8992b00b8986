//! Subscriber setup for binaries embedding the crate.

use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{AppError, AppResult};

/// Installs a global `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. "servicehub=info"). `json` switches to one JSON
/// object per line.
///
/// # Errors
///
/// Returns [`AppError::Config`] if a global subscriber is already set.
pub fn init_tracing(default_filter: &str, json: bool) -> AppResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| AppError::Config(format!("failed to install tracing subscriber: {e}")))
}
