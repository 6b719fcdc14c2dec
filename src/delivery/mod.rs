//! Notification delivery.
//!
//! A [`Provider`] announces new members somewhere. The production chain for
//! each enabled `notifications` entry is built by [`build_providers`]:
//!
//! ```text
//! Retrying( RateLimited( WebhookProvider ) )
//! ```
//!
//! Rate limiting sits innermost so that every retry attempt also respects
//! the spacing; retry sits outermost so that a cancelled wait aborts the
//! whole call.

mod message;
mod rate_limit;
mod retrying;
mod transport;
mod webhook;

pub use message::{DiscordMessage, MAX_LISTED, SlackMessage};
pub use rate_limit::RateLimited;
pub use retrying::Retrying;
pub use transport::{HttpTransport, Transport};
pub use webhook::WebhookProvider;

use crate::core::{DeliverySettings, Settings};
use crate::error::NotifyError;
use crate::metrics::MetricsSink;
use crate::model::{EntityKey, Member};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A notification destination.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Announce `members` as new for `entity`. An empty list succeeds
    /// without contacting the destination.
    async fn deliver(
        &self,
        entity: &EntityKey,
        members: &[Member],
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError>;

    /// Lightweight connectivity check.
    async fn probe(&self, cancel: &CancellationToken) -> Result<(), NotifyError>;
}

#[async_trait]
impl<P: Provider + ?Sized> Provider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn deliver(
        &self,
        entity: &EntityKey,
        members: &[Member],
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        (**self).deliver(entity, members, cancel).await
    }

    async fn probe(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        (**self).probe(cancel).await
    }
}

/// Wrap `base` as `Retrying(RateLimited(base))` using `settings`.
pub fn decorate<P: Provider + 'static>(
    base: P,
    settings: &DeliverySettings,
    metrics: Arc<dyn MetricsSink>,
) -> Arc<dyn Provider> {
    Arc::new(Retrying::new(
        RateLimited::new(base, settings.rate_limit_interval()),
        settings.retry_policy(),
        metrics,
    ))
}

/// One decorated provider per enabled `notifications` entry, in order.
pub fn build_providers(
    settings: &Settings,
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn MetricsSink>,
) -> Vec<Arc<dyn Provider>> {
    settings
        .enabled_providers()
        .map(|provider| {
            decorate(
                WebhookProvider::new(provider, Arc::clone(&transport)),
                &settings.delivery,
                Arc::clone(&metrics),
            )
        })
        .collect()
}
