//! Builder for constructing a [`ConfigReloader`].

use super::{ConfigLoader, ConfigReloader};
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::sources::{ConfigSource, EnvSource, FileSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default quiet period after a change notification.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Fluent setup for a [`ConfigReloader`].
///
/// Precedence, lowest first: the configuration file (100), custom sources
/// (their own priority), then environment variables (300).
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::core::ConfigReloader;
/// use std::time::Duration;
///
/// # fn example() -> starwatch::error::Result<()> {
/// let reloader = ConfigReloader::builder()
///     .with_file("config.yaml")
///     .with_env_overrides("STARWATCH", "__")
///     .with_env_alias("GITHUB_TOKEN", "github.token")
///     .with_debounce(Duration::from_millis(250))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReloaderBuilder {
    file_path: Option<PathBuf>,
    env_prefix: Option<String>,
    env_separator: Option<String>,
    env_aliases: Vec<(String, String)>,
    custom_sources: Vec<Box<dyn ConfigSource>>,
    debounce: Duration,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl ReloaderBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: None,
            env_separator: None,
            env_aliases: Vec::new(),
            custom_sources: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            metrics: None,
        }
    }

    /// The configuration file to load and watch.
    ///
    /// Supported formats: YAML (.yaml, .yml), TOML (.toml), JSON (.json)
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Let `PREFIX_SECTION__KEY` variables override file values.
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.env_separator = Some(separator.to_string());
        self
    }

    /// Map a conventional variable name onto a key path, for example
    /// `GITHUB_TOKEN` onto `github.token`. Implies environment overrides.
    pub fn with_env_alias(mut self, var: &str, key: &str) -> Self {
        self.env_aliases.push((var.to_string(), key.to_string()));
        self
    }

    /// Add a custom configuration source.
    pub fn with_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.custom_sources.push(Box::new(source));
        self
    }

    /// Quiet period after the last change notification before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Record reload outcomes.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Perform the initial load and validation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No source was configured
    /// - A source cannot be read or parsed
    /// - The merged configuration fails validation
    pub fn build(self) -> Result<ConfigReloader> {
        let mut loader = ConfigLoader::new();

        if let Some(path) = &self.file_path {
            loader.add_source(Box::new(FileSource::new(path)));
        }
        for source in self.custom_sources {
            loader.add_source(source);
        }
        if self.env_prefix.is_some() || !self.env_aliases.is_empty() {
            let prefix = self.env_prefix.as_deref().unwrap_or("STARWATCH");
            let separator = self.env_separator.as_deref().unwrap_or("__");
            let env = self
                .env_aliases
                .iter()
                .fold(EnvSource::new(prefix, separator), |env, (var, key)| {
                    env.with_alias(var.as_str(), key.as_str())
                });
            loader.add_source(Box::new(env));
        }

        let initial = loader.load_settings()?;
        tracing::debug!(sources = ?loader.source_names(), "configuration loaded");

        Ok(ConfigReloader::from_parts(
            initial,
            loader,
            self.file_path,
            self.debounce,
            self.metrics,
        ))
    }
}

impl Default for ReloaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::sources::InlineSource;

    #[test]
    fn test_builder_defaults() {
        let builder = ReloaderBuilder::new();
        assert!(builder.file_path.is_none());
        assert_eq!(builder.debounce, DEFAULT_DEBOUNCE);
    }

    #[test]
    fn test_builder_env_overrides() {
        let builder = ReloaderBuilder::new()
            .with_env_overrides("APP", "__")
            .with_env_alias("GITHUB_TOKEN", "github.token");

        assert_eq!(builder.env_prefix, Some("APP".to_string()));
        assert_eq!(builder.env_separator, Some("__".to_string()));
        assert_eq!(builder.env_aliases.len(), 1);
    }

    #[test]
    fn test_build_requires_a_source() {
        assert!(matches!(
            ReloaderBuilder::new().build(),
            Err(ConfigError::LoadError(_))
        ));
    }

    #[test]
    fn test_build_validates() {
        let result = ReloaderBuilder::new()
            .with_source(InlineSource::yaml("repositories: []\n"))
            .build();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_build_from_inline_source() {
        let reloader = ReloaderBuilder::new()
            .with_source(InlineSource::yaml(
                "repositories:\n  - owner: tokio-rs\n    repo: tokio\n",
            ))
            .with_debounce(Duration::from_millis(10))
            .build()
            .unwrap();

        assert_eq!(reloader.get().repositories[0].name, "tokio");
        assert_eq!(reloader.debounce(), Duration::from_millis(10));
        assert!(reloader.path().is_none());
    }
}
