//! Ordered reload callbacks.

use crate::core::{ChangeSet, Settings};
use crate::error::ConfigError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a reload callback returns.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type CallbackFuture = Pin<Box<dyn Future<Output = CallbackResult> + Send>>;
type Callback = Arc<dyn Fn(ReloadEvent) -> CallbackFuture + Send + Sync>;

/// Payload handed to every reload callback.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// The snapshot that is live right now.
    pub old: Arc<Settings>,
    /// The validated snapshot about to go live.
    pub new: Arc<Settings>,
    /// Facets that differ. Never empty.
    pub changes: ChangeSet,
}

/// Callbacks invoked, in registration order, before a reload is applied.
///
/// The first failure stops the sequence; callbacks that already ran are not
/// undone.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::notify::CallbackRegistry;
///
/// # async fn example() {
/// let registry = CallbackRegistry::new();
/// registry
///     .register(|event| async move {
///         println!("changed: {:?}", event.changes.facets());
///         Ok(())
///     })
///     .await;
/// # }
/// ```
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: RwLock<Vec<Callback>>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback. It runs after every callback registered before it.
    pub async fn register<F, Fut>(&self, callback: F)
    where
        F: Fn(ReloadEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackResult> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |event| Box::pin(callback(event)));
        self.callbacks.write().await.push(callback);
    }

    /// Run every callback in order, stopping at the first failure.
    pub async fn invoke_all(&self, event: &ReloadEvent) -> Result<(), ConfigError> {
        let callbacks = self.callbacks.read().await.clone();
        for (index, callback) in callbacks.iter().enumerate() {
            if let Err(e) = callback(event.clone()).await {
                return Err(ConfigError::CallbackFailed {
                    index,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event() -> ReloadEvent {
        let settings: Settings =
            serde_json::from_str(r#"{"repositories": [{"owner": "a", "repo": "b"}]}"#).unwrap();
        let mut new = settings.clone();
        new.check.interval_minutes = 1;
        ReloadEvent {
            changes: ChangeSet::between(&settings, &new),
            old: Arc::new(settings),
            new: Arc::new(new),
        }
    }

    #[tokio::test]
    async fn test_callbacks_run_in_registration_order() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let calls = Arc::clone(&calls);
            registry
                .register(move |_| {
                    calls.lock().push(i);
                    async { Ok(()) }
                })
                .await;
        }

        registry.invoke_all(&event()).await.unwrap();
        assert_eq!(*calls.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_sequence() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&calls);
        registry
            .register(move |_| {
                first.lock().push("first");
                async { Ok(()) }
            })
            .await;
        registry
            .register(|_| async { Err("client rebuild failed".into()) })
            .await;
        let third = Arc::clone(&calls);
        registry
            .register(move |_| {
                third.lock().push("third");
                async { Ok(()) }
            })
            .await;

        let err = registry.invoke_all(&event()).await.unwrap_err();
        match err {
            ConfigError::CallbackFailed { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("client rebuild failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*calls.lock(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_callback_sees_both_snapshots() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&seen);
        registry
            .register(move |event: ReloadEvent| {
                *sink.lock() = Some((
                    event.old.check.interval_minutes,
                    event.new.check.interval_minutes,
                    event.changes.cadence,
                ));
                async { Ok(()) }
            })
            .await;

        registry.invoke_all(&event()).await.unwrap();
        assert_eq!(*seen.lock(), Some((60, 1, true)));
    }
}
