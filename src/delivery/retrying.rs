//! Bounded retry around a provider, with delivery metrics.

use super::Provider;
use crate::error::NotifyError;
use crate::metrics::MetricsSink;
use crate::model::{EntityKey, Member};
use crate::retry::{RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Retries deliveries and probes of the wrapped provider.
///
/// Every delivery attempt records a `success` or `failed` event; the
/// latency of the whole call, retries included, is recorded once.
pub struct Retrying<P> {
    inner: P,
    policy: RetryPolicy,
    metrics: Arc<dyn MetricsSink>,
}

impl<P: Provider> Retrying<P> {
    /// Wrap `inner`.
    pub fn new(inner: P, policy: RetryPolicy, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            inner,
            policy,
            metrics,
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for Retrying<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn deliver(
        &self,
        entity: &EntityKey,
        members: &[Member],
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        if members.is_empty() {
            return Ok(());
        }
        let name = self.inner.name();
        let started = Instant::now();

        let result = retry_with_backoff(&self.policy, cancel, move |attempt| async move {
            let result = self.inner.deliver(entity, members, cancel).await;
            match &result {
                Ok(()) => self.metrics.record_notification(name, "success"),
                Err(NotifyError::Cancelled) => {}
                Err(e) => {
                    tracing::warn!(provider = name, %entity, attempt, error = %e, "delivery attempt failed");
                    self.metrics.record_notification(name, "failed");
                }
            }
            result
        })
        .await;

        self.metrics
            .observe_notification_latency(name, started.elapsed());
        match &result {
            Err(NotifyError::Cancelled) => {
                tracing::debug!(provider = name, %entity, "delivery cancelled");
            }
            Err(e) => {
                tracing::error!(provider = name, %entity, error = %e, "delivery failed after retries");
                self.metrics
                    .record_notification_error(name, "delivery_failed");
            }
            Ok(()) => {}
        }
        result
    }

    async fn probe(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        let name = self.inner.name();
        let result =
            retry_with_backoff(&self.policy, cancel, move |_| self.inner.probe(cancel)).await;
        if let Err(e) = &result {
            if !matches!(e, NotifyError::Cancelled) {
                self.metrics.record_notification_error(name, "probe_failed");
            }
        }
        result
    }
}
