//! Structured logging setup with a reloadable level.

use crate::core::{LogFormat, LogLevel};
use crate::error::ServiceError;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Changes the active log level of the installed subscriber.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Replace the active filter with `level`.
    ///
    /// # Errors
    ///
    /// Fails if the subscriber holding the filter is gone.
    pub fn set_level(&self, level: LogLevel) -> Result<(), ServiceError> {
        self.filter
            .reload(EnvFilter::new(level.as_str()))
            .map_err(|e| ServiceError::Logging(e.to_string()))
    }
}

/// Install the global subscriber.
///
/// - `LogFormat::Json`: flattened JSON, one object per line.
/// - `LogFormat::Text`: human-readable lines.
///
/// `RUST_LOG` takes precedence over `level` when set. Call once at startup.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<LogHandle, ServiceError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let (filter, handle) = reload::Layer::new(env_filter);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    installed.map_err(|e| ServiceError::Logging(e.to_string()))?;

    Ok(LogHandle { filter: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names_are_valid_filters() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert!(
                EnvFilter::try_new(level.as_str()).is_ok(),
                "{} should be a valid filter",
                level.as_str()
            );
        }
    }

    #[test]
    fn test_reload_handle_swaps_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry().with(layer);
        let log = LogHandle { filter: handle };

        tracing::subscriber::with_default(subscriber, || {
            log.set_level(LogLevel::Debug).unwrap();
            assert!(tracing::enabled!(tracing::Level::DEBUG));
            log.set_level(LogLevel::Warn).unwrap();
            assert!(!tracing::enabled!(tracing::Level::INFO));
        });
    }
}
