//! File-based configuration source.

use super::ConfigSource;
use super::config_source::collect;
use crate::error::{ConfigError, Result};
use config::{File, FileFormat};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration file on disk, re-read on every reload.
///
/// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::sources::FileSource;
///
/// let source = FileSource::new("config.yaml");
/// ```
pub struct FileSource {
    path: PathBuf,
    priority: i32,
}

impl FileSource {
    /// Create a file source with the default priority (100).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> Result<FileFormat> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                ConfigError::LoadError(format!(
                    "Unable to determine file format for: {}",
                    self.path.display()
                ))
            })?;

        match extension {
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "toml" => Ok(FileFormat::Toml),
            "json" => Ok(FileFormat::Json),
            _ => Err(ConfigError::LoadError(format!(
                "Unsupported file extension: {extension}. Supported: .yaml, .yml, .toml, .json"
            ))),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let format = self.format()?;
        if !self.path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Configuration file not found: {}",
                self.path.display()
            )));
        }

        let file = File::from(self.path.clone()).format(format).required(true);
        collect(file, &self.name())
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
