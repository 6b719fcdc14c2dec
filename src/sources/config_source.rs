//! Configuration source trait.

use crate::error::Result;
use std::collections::HashMap;

/// A place configuration values come from.
///
/// Sources are loaded synchronously on every reload and merged by
/// [`ConfigLoader`](crate::core::ConfigLoader) in priority order.
pub trait ConfigSource: Send + Sync {
    /// Load configuration as a key-value map.
    ///
    /// Keys may name top-level sections (with table values) or dotted paths
    /// such as `github.token`; the loader merges both leaf by leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be loaded or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this source (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Inline text: 200
    /// - Configuration file: 100
    fn priority(&self) -> i32 {
        100
    }
}

/// Build a single-source `config` tree and return its top-level entries.
pub(crate) fn collect<S>(source: S, origin: &str) -> Result<HashMap<String, config::Value>>
where
    S: config::Source + Send + Sync + 'static,
{
    config::Config::builder()
        .add_source(source)
        .build()
        .map_err(|e| crate::error::ConfigError::LoadError(format!("{origin}: {e}")))?
        .try_deserialize::<HashMap<String, config::Value>>()
        .map_err(|e| crate::error::ConfigError::DeserializationError(format!("{origin}: {e}")))
}
