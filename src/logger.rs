//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup. `main` bootstraps with a
//! [`tracing_subscriber::reload`] handle so the configured level can replace
//! the bootstrap level after the config file is read.

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::error::AppError;

/// Handle used to swap the active filter once config is loaded.
pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Build the filter for `level`.
///
/// If `prefer_level` is `true`, `level` takes precedence and `RUST_LOG` is only
/// used as a fallback when `level` is invalid. If `prefer_level` is `false`,
/// `RUST_LOG` takes precedence and `level` is the fallback.
fn build_filter(level: &str, prefer_level: bool) -> Result<EnvFilter, AppError> {
    if prefer_level {
        match EnvFilter::try_new(level) {
            Ok(filter) => Ok(filter),
            Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{level}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            }),
        }
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))
    }
}

/// Initialise the global tracing subscriber.
///
/// `level` accepts standard level strings: `"error"`, `"warn"`, `"info"`,
/// `"debug"`, `"trace"`, or any `EnvFilter` directive.
pub fn init(level: &str, prefer_level: bool) -> Result<ReloadHandle, AppError> {
    let filter = build_filter(level, prefer_level)?;
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(handle)
}

/// Replace the active filter with one built from the configured `level`.
pub fn set_level(handle: &ReloadHandle, level: &str) -> Result<(), AppError> {
    let filter = build_filter(level, true)?;
    handle
        .reload(filter)
        .map_err(|e| AppError::Logger(format!("failed to reload filter: {e}")))
}
