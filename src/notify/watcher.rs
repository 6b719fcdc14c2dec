//! File watching for automatic configuration reloads.

use crate::error::{ConfigError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, mpsc};

/// Forwards raw file-change notifications as paths.
///
/// Only creations and modifications are forwarded. No debouncing happens
/// here; the reloader collapses bursts itself. Dropping or closing the
/// watcher ends the event stream.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::notify::ConfigWatcher;
///
/// # async fn example() -> starwatch::error::Result<()> {
/// let (watcher, mut events) = ConfigWatcher::new()?;
/// watcher.watch("config.yaml").await?;
///
/// while let Some(path) = events.recv().await {
///     println!("{} changed", path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl ConfigWatcher {
    /// Create a watcher and the receiver its events arrive on.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {e}")))?;

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
            },
            rx,
        ))
    }

    /// Start watching `path` (a file or a directory, non-recursively).
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or cannot be watched, or
    /// if the watcher was closed.
    pub async fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical_path = path
            .as_ref()
            .canonicalize()
            .map_err(|e| ConfigError::WatchError(format!("Failed to resolve path: {e}")))?;

        let mut guard = self.watcher.lock().await;
        let watcher = guard
            .as_mut()
            .ok_or_else(|| ConfigError::WatchError("watcher is closed".to_string()))?;
        watcher
            .watch(&canonical_path, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatchError(format!("Failed to watch path: {e}")))?;
        Ok(())
    }

    /// Release the platform watcher. Idempotent.
    pub async fn close(&self) {
        if self.watcher.lock().await.take().is_some() {
            tracing::debug!("file watcher closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watch_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "check: {}").unwrap();

        let (watcher, _rx) = ConfigWatcher::new().unwrap();
        watcher.watch(&config_path).await.unwrap();
        // Watching twice is harmless.
        watcher.watch(&config_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_nonexistent_file() {
        let (watcher, _rx) = ConfigWatcher::new().unwrap();
        let result = watcher.watch("/nonexistent/config.yaml").await;
        assert!(matches!(result, Err(ConfigError::WatchError(_))));
    }

    #[tokio::test]
    async fn test_file_change_is_forwarded() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "check: {}").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).await.unwrap();

        let target = config_path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&target, "check:\n  interval_minutes: 5\n").unwrap();
        });

        let path = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        assert_eq!(path.file_name(), config_path.file_name());
    }

    #[tokio::test]
    async fn test_close_ends_the_stream() {
        let temp_dir = TempDir::new().unwrap();
        let (watcher, mut rx) = ConfigWatcher::new().unwrap();
        watcher.watch(temp_dir.path()).await.unwrap();

        watcher.close().await;
        watcher.close().await;
        assert!(watcher.watch(temp_dir.path()).await.is_err());

        let next = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(next.is_none());
    }
}
