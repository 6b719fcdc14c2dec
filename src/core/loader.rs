//! Configuration loader that merges multiple sources.

use super::{Settings, Validate};
use crate::error::{ConfigError, Result};
use crate::sources::ConfigSource;
use config::{Value, ValueKind};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Loads and merges configuration from multiple sources.
///
/// Sources are applied lowest priority first. Tables are merged leaf by
/// leaf, so an environment override of `github.token` keeps the file's
/// `github.timeout_seconds`. Lists are replaced whole.
pub struct ConfigLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a configuration source.
    pub fn add_source(&mut self, source: Box<dyn ConfigSource>) {
        self.sources.push(source);
    }

    /// Load and merge configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No source was added
    /// - Any source fails to load
    /// - Deserialization fails
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if self.sources.is_empty() {
            return Err(ConfigError::LoadError(
                "No configuration sources specified".to_string(),
            ));
        }

        let mut sorted_sources: Vec<_> = self.sources.iter().collect();
        sorted_sources.sort_by_key(|s| s.priority());

        let mut builder = config::Config::builder();
        for source in sorted_sources {
            let values = source.load().map_err(|e| {
                ConfigError::LoadError(format!("Failed to load source '{}': {}", source.name(), e))
            })?;

            let mut leaves = Vec::new();
            for (key, value) in values {
                flatten(key, value, &mut leaves);
            }
            for (key, value) in leaves {
                builder = builder.set_override(&key, value).map_err(|e| {
                    ConfigError::LoadError(format!(
                        "Failed to merge source '{}': {}",
                        source.name(),
                        e
                    ))
                })?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to build configuration: {e}")))?;

        config.try_deserialize::<T>().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to deserialize configuration: {e}"))
        })
    }

    /// Load, default and validate a [`Settings`] snapshot.
    pub fn load_settings(&self) -> Result<Settings> {
        let settings: Settings = self.load()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Get the list of source names in priority order.
    pub fn source_names(&self) -> Vec<String> {
        let mut sorted_sources: Vec<_> = self.sources.iter().collect();
        sorted_sources.sort_by_key(|s| s.priority());
        sorted_sources.iter().map(|s| s.name()).collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand nested tables into `(dotted.path, leaf)` pairs.
fn flatten(prefix: String, value: Value, out: &mut Vec<(String, Value)>) {
    match value.kind {
        ValueKind::Table(table) if !table.is_empty() => {
            let table: HashMap<String, Value> = table.into_iter().collect();
            for (key, child) in table {
                flatten(format!("{prefix}.{key}"), child, out);
            }
        }
        kind => out.push((prefix, Value::new(None, kind))),
    }
}
