//! Bounded retry with linear backoff, shared by the remote client and the
//! notification pipeline.

use crate::error::Retryable;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// Roughly 30 years, the same horizon tokio uses for an unreachable deadline.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + after`, or a deadline decades away when the sum does not fit in
/// an [`Instant`].
pub fn deadline(from: Instant, after: Duration) -> Instant {
    from.checked_add(after)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base backoff; the wait after attempt `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Wait after the given (1-based) failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

/// Run `op` until it succeeds, up to `1 + max_retries` attempts.
///
/// Rate-limited errors are returned immediately. Cancellation, observed
/// either during an attempt or during a backoff wait, returns
/// `E::cancelled()` without starting another attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(E::cancelled());
        }
        attempt += 1;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(E::cancelled()),
            result = op(attempt) => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_rate_limited() {
            tracing::warn!(attempt, error = %err, "rate limited, not retrying");
            return Err(err);
        }
        if attempt > policy.max_retries {
            tracing::warn!(attempts = attempt, error = %err, "retries exhausted");
            return Err(err);
        }

        let delay = policy.backoff_for(attempt);
        tracing::debug!(attempt, ?delay, error = %err, "attempt failed, backing off");
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(E::cancelled()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}
