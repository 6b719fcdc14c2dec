//! Configuration held in memory as text.

use super::ConfigSource;
use super::config_source::collect;
use crate::error::Result;
use config::{File, FileFormat};
use std::collections::HashMap;

/// Raw configuration text in a known format.
///
/// Useful for embedding defaults in the binary and for tests.
///
/// # Examples
///
/// ```rust
/// use config::FileFormat;
/// use starwatch::sources::{ConfigSource, InlineSource};
///
/// let source = InlineSource::new("check:\n  interval_minutes: 5\n", FileFormat::Yaml);
/// assert!(source.load().unwrap().contains_key("check"));
/// ```
pub struct InlineSource {
    text: String,
    format: FileFormat,
    priority: i32,
}

impl InlineSource {
    /// Create an inline source with priority 200.
    pub fn new(text: impl Into<String>, format: FileFormat) -> Self {
        Self {
            text: text.into(),
            format,
            priority: 200,
        }
    }

    /// Interpret `text` as YAML.
    pub fn yaml(text: impl Into<String>) -> Self {
        Self::new(text, FileFormat::Yaml)
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigSource for InlineSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        collect(File::from_str(&self.text, self.format), &self.name())
    }

    fn name(&self) -> String {
        format!("inline:{:?}", self.format)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
