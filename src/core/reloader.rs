//! The live configuration handle and its reload pipeline.

use super::changes::restart_only_facets;
use super::{ChangeSet, ConfigLoader, ReloaderBuilder, Settings};
use crate::error::{ConfigError, Result};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::notify::{CallbackRegistry, CallbackResult, ReloadEvent};
use arc_swap::ArcSwap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;

/// Result of a reload that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Nothing hot-reloadable changed; no callback ran and nothing was swapped.
    Unchanged,
    /// Every callback succeeded and the new snapshot is live.
    Applied(ChangeSet),
}

struct WatchTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    #[cfg(feature = "file-watch")]
    watcher: ConfigWatcher,
}

/// Owns the current [`Settings`] snapshot and keeps it up to date.
///
/// Reads go through [`ArcSwap`]: many concurrent readers, no lock, and a
/// single writer (the reload pipeline, serialized by an async mutex). A
/// reload runs load, validate, diff, callbacks, and only then swaps, so the
/// live snapshot is never ahead of the side effects that depend on it.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::core::ConfigReloader;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> starwatch::error::Result<()> {
/// let reloader = Arc::new(
///     ConfigReloader::builder()
///         .with_file("config.yaml")
///         .with_env_overrides("STARWATCH", "__")
///         .build()?,
/// );
///
/// reloader
///     .add_callback(|event| async move {
///         println!("changed: {:?}", event.changes.facets());
///         Ok(())
///     })
///     .await;
///
/// let shutdown = CancellationToken::new();
/// reloader.start(&shutdown).await?;
/// println!("checking every {:?}", reloader.get().check_interval());
/// # Ok(())
/// # }
/// ```
pub struct ConfigReloader {
    path: Option<PathBuf>,
    loader: ConfigLoader,
    current: ArcSwap<Settings>,
    callbacks: CallbackRegistry,
    debounce: Duration,
    reload_lock: tokio::sync::Mutex<()>,
    attempts: AtomicU64,
    running: AtomicBool,
    watch: parking_lot::Mutex<Option<WatchTask>>,
    metrics: Arc<dyn MetricsSink>,
}

impl ConfigReloader {
    /// Create a builder.
    pub fn builder() -> ReloaderBuilder {
        ReloaderBuilder::new()
    }

    pub(crate) fn from_parts(
        initial: Settings,
        loader: ConfigLoader,
        path: Option<PathBuf>,
        debounce: Duration,
        metrics: Option<Arc<dyn MetricsSink>>,
    ) -> Self {
        Self {
            path,
            loader,
            current: ArcSwap::from_pointee(initial),
            callbacks: CallbackRegistry::new(),
            debounce,
            reload_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            running: AtomicBool::new(false),
            watch: parking_lot::Mutex::new(None),
            metrics: metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
        }
    }

    /// The live snapshot. Never blocks and never touches the disk.
    pub fn get(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    /// Register a callback run on every applied reload, after those
    /// registered before it. Returning an error aborts the reload.
    pub async fn add_callback<F, Fut>(&self, callback: F)
    where
        F: Fn(ReloadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        self.callbacks.register(callback).await;
    }

    /// The watched configuration file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Quiet period that must follow the last change notification before a
    /// reload runs.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// How many reloads were attempted, successful or not.
    pub fn reload_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// True while the file watcher runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Load, validate and apply the configuration now.
    ///
    /// # Errors
    ///
    /// Load, parse or validation failures and callback failures. In every
    /// error case the previous snapshot stays live, untouched.
    pub async fn reload(&self) -> Result<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let new = match self.loader.load_settings() {
            Ok(settings) => Arc::new(settings),
            Err(e) => {
                tracing::warn!(error = %e, "configuration reload rejected, keeping previous configuration");
                self.metrics.record_config_reload("invalid");
                return Err(e);
            }
        };
        let old = self.current.load_full();

        let deferred = restart_only_facets(&old, &new);
        if !deferred.is_empty() {
            tracing::warn!(facets = ?deferred, "configuration changes require a restart");
        }

        let changes = ChangeSet::between(&old, &new);
        if changes.is_empty() {
            tracing::debug!("configuration unchanged, skipping reload");
            self.metrics.record_config_reload("unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }

        let event = ReloadEvent {
            old,
            new: Arc::clone(&new),
            changes,
        };
        if let Err(e) = self.callbacks.invoke_all(&event).await {
            tracing::error!(error = %e, facets = ?changes.facets(), "reload callback failed, configuration not swapped");
            self.metrics.record_config_reload("callback_failed");
            return Err(e);
        }

        self.current.store(new);
        tracing::info!(facets = ?changes.facets(), "configuration reloaded");
        self.metrics.record_config_reload("applied");
        Ok(ReloadOutcome::Applied(changes))
    }

    /// Start watching the configuration file. Reloads run on a background
    /// task until `shutdown` fires or [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AlreadyRunning`] on a second call and
    /// [`ConfigError::WatchError`] when there is no file or it cannot be
    /// watched.
    #[cfg(feature = "file-watch")]
    pub async fn start(self: &Arc<Self>, shutdown: &CancellationToken) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyRunning);
        }
        let result = self.start_watching(shutdown).await;
        if result.is_err() {
            self.running.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Always fails: this build has no file watcher. Use
    /// [`reload`](Self::reload) instead.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FeatureNotEnabled`].
    #[cfg(not(feature = "file-watch"))]
    pub async fn start(self: &Arc<Self>, _shutdown: &CancellationToken) -> Result<()> {
        Err(ConfigError::FeatureNotEnabled("file-watch"))
    }

    #[cfg(feature = "file-watch")]
    async fn start_watching(self: &Arc<Self>, shutdown: &CancellationToken) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| ConfigError::WatchError("no configuration file to watch".to_string()))?;

        let (watcher, events) = ConfigWatcher::new()?;
        watcher.watch(&path).await?;
        // Editors that save by rename replace the file, so watch its directory too.
        if let Some(dir) = path.canonicalize()?.parent() {
            watcher.watch(dir).await?;
        }

        let cancel = shutdown.child_token();
        let task = self.spawn_watch_loop(events, cancel.clone());
        *self.watch.lock() = Some(WatchTask {
            cancel,
            task,
            watcher,
        });
        tracing::info!(path = %path.display(), debounce = ?self.debounce, "watching configuration file");
        Ok(())
    }

    /// Stop watching and release the watcher. Idempotent.
    pub async fn stop(&self) {
        let Some(watch) = self.watch.lock().take() else {
            return;
        };
        watch.cancel.cancel();
        #[cfg(feature = "file-watch")]
        watch.watcher.close().await;
        if let Err(e) = watch.task.await {
            tracing::warn!(error = %e, "configuration watch task ended abnormally");
        }
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("configuration watcher stopped");
    }

    fn spawn_watch_loop(
        self: &Arc<Self>,
        events: mpsc::UnboundedReceiver<PathBuf>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).watch_loop(events, cancel))
    }

    /// Collapse bursts of change notifications: every relevant event pushes
    /// the deadline out by `debounce`, and a reload runs once it passes.
    async fn watch_loop(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<PathBuf>,
        cancel: CancellationToken,
    ) {
        let mut deadline: Option<Instant> = None;
        loop {
            let pending = deadline;
            let timer = async move {
                match pending {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(path) if self.is_config_path(&path) => {
                        tracing::trace!(path = %path.display(), "configuration change notification");
                        deadline = Some(crate::retry::deadline(Instant::now(), self.debounce));
                    }
                    Some(_) => {}
                    None => break,
                },
                () = timer => {
                    deadline = None;
                    if let Err(e) = self.reload().await {
                        tracing::warn!(error = %e, "automatic reload failed");
                    }
                }
            }
        }
        tracing::debug!("configuration watch loop exited");
    }

    fn is_config_path(&self, candidate: &Path) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        candidate == path
            || (candidate.file_name().is_some() && candidate.file_name() == path.file_name())
    }
}
