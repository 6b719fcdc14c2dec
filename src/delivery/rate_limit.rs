//! Minimum spacing between deliveries to one provider.

use super::Provider;
use crate::error::NotifyError;
use crate::model::{EntityKey, Member};
use crate::retry::deadline;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Delays a delivery until `interval` has passed since the previous one
/// started. Probes pass straight through.
///
/// The wait suspends the caller and ends early with
/// [`NotifyError::Cancelled`] when `cancel` fires; a cancelled wait does
/// not count as a delivery.
pub struct RateLimited<P> {
    inner: P,
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl<P: Provider> RateLimited<P> {
    /// Wrap `inner`.
    pub fn new(inner: P, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }

    async fn wait_turn(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready = deadline(previous, self.interval);
            if ready > Instant::now() {
                tracing::debug!(provider = self.inner.name(), wait = ?(ready - Instant::now()), "rate limiting delivery");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(NotifyError::Cancelled),
                    () = tokio::time::sleep_until(ready) => {}
                }
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

#[async_trait]
impl<P: Provider> Provider for RateLimited<P> {
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
        self.wait_turn(cancel).await?;
        self.inner.deliver(entity, members, cancel).await
    }

    async fn probe(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        self.inner.probe(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use std::sync::Arc;

    fn members() -> Vec<Member> {
        vec![Member::new(1, "octocat")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_deliveries_are_spaced() {
        let fake = Arc::new(FakeProvider::new("discord"));
        let limited = RateLimited::new(fake.clone(), Duration::from_secs(60));
        let entity = EntityKey::new("o", "r");
        let cancel = CancellationToken::new();

        limited.deliver(&entity, &members(), &cancel).await.unwrap();
        limited.deliver(&entity, &members(), &cancel).await.unwrap();

        let calls = fake.delivery_times();
        assert_eq!(calls.len(), 2);
        assert!(calls[1] - calls[0] >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_is_never_delayed() {
        let fake = Arc::new(FakeProvider::new("slack"));
        let limited = RateLimited::new(fake.clone(), Duration::from_secs(60));
        let cancel = CancellationToken::new();

        limited
            .deliver(&EntityKey::new("o", "r"), &members(), &cancel)
            .await
            .unwrap();
        let before = Instant::now();
        limited.probe(&cancel).await.unwrap();
        limited.probe(&cancel).await.unwrap();

        assert_eq!(Instant::now(), before);
        assert_eq!(fake.probe_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_interval_waits_until_cancelled() {
        let fake = Arc::new(FakeProvider::new("discord"));
        let limited = Arc::new(RateLimited::new(
            fake.clone(),
            Duration::from_secs(u64::MAX),
        ));
        let entity = EntityKey::new("o", "r");
        let cancel = CancellationToken::new();

        limited.deliver(&entity, &members(), &cancel).await.unwrap();

        let waiting = {
            let limited = Arc::clone(&limited);
            let cancel = cancel.clone();
            tokio::spawn(async move { limited.deliver(&entity, &members(), &cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(3600)).await;
        cancel.cancel();

        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(NotifyError::Cancelled)));
        assert_eq!(fake.delivery_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let fake = Arc::new(FakeProvider::new("discord"));
        let limited = Arc::new(RateLimited::new(fake.clone(), Duration::from_secs(60)));
        let entity = EntityKey::new("o", "r");
        let cancel = CancellationToken::new();

        limited.deliver(&entity, &members(), &cancel).await.unwrap();

        let waiting = {
            let limited = Arc::clone(&limited);
            let cancel = cancel.clone();
            tokio::spawn(async move { limited.deliver(&entity, &members(), &cancel).await })
        };
        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();

        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(NotifyError::Cancelled)));
        assert_eq!(fake.delivery_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_delivery_does_not_take_a_slot() {
        let fake = Arc::new(FakeProvider::new("discord"));
        let limited = RateLimited::new(fake.clone(), Duration::from_secs(60));
        let entity = EntityKey::new("o", "r");
        let cancel = CancellationToken::new();

        limited.deliver(&entity, &[], &cancel).await.unwrap();
        let before = Instant::now();
        limited.deliver(&entity, &members(), &cancel).await.unwrap();

        assert_eq!(Instant::now(), before);
        assert_eq!(fake.delivery_times().len(), 1);
    }
}
