//! Environment variable configuration source.

use super::ConfigSource;
use super::config_source::collect;
use crate::error::Result;
use config::Environment;
use std::collections::HashMap;

/// Conventional variable names and the key each one overrides.
pub const STANDARD_ALIASES: &[(&str, &str)] = &[
    ("GITHUB_TOKEN", "github.token"),
    ("CHECK_INTERVAL_MINUTES", "check.interval_minutes"),
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("STORAGE_PATH", "storage.path"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
];

/// Environment variable configuration source.
///
/// `PREFIX_SECTION__KEY=value` overrides `section.key`. Explicit aliases map
/// conventional variable names (such as `GITHUB_TOKEN`) onto a key path.
///
/// # Examples
///
/// ```rust
/// use starwatch::sources::EnvSource;
///
/// // STARWATCH_CHECK__INTERVAL_MINUTES=5 -> check.interval_minutes = 5
/// // GITHUB_TOKEN=ghp_xxx                 -> github.token = "ghp_xxx"
/// let source = EnvSource::new("STARWATCH", "__").with_alias("GITHUB_TOKEN", "github.token");
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    aliases: Vec<(String, String)>,
    vars: Option<HashMap<String, String>>,
    priority: i32,
}

impl EnvSource {
    /// Create a new environment variable source with priority 300.
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            aliases: Vec::new(),
            vars: None,
            priority: 300,
        }
    }

    /// Map the variable `var` onto the dotted key `key`.
    pub fn with_alias(mut self, var: impl Into<String>, key: impl Into<String>) -> Self {
        self.aliases.push((var.into(), key.into()));
        self
    }

    /// Read from `vars` instead of the process environment.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let environment = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true)
            .source(self.vars.clone());
        let mut map = collect(environment, &self.name())?;

        for (var, key) in &self.aliases {
            if let Some(value) = self.var(var).filter(|v| !v.is_empty()) {
                map.insert(key.clone(), config::Value::from(value));
            }
        }
        Ok(map)
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
