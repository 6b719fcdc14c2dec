//! Fetching the current member list of a repository.
//!
//! Three layers, innermost first:
//!
//! - [`RemoteApi`]: one upstream call per method (a single page, or the quota).
//!   [`GitHubApi`] is the HTTP implementation.
//! - [`PagedClient`]: walks every page and returns the full list, or fails as
//!   a whole.
//! - [`RetryingSource`]: bounded retry with linear backoff around any
//!   [`MemberSource`].

mod github;

pub use github::{GitHubApi, PER_PAGE};

use crate::core::Settings;
use crate::error::{RemoteError, RemoteErrorKind};
use crate::metrics::MetricsSink;
use crate::model::{EntityKey, Member, Quota};
use crate::retry::{RetryPolicy, retry_with_backoff};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One page of members as returned by the upstream.
#[derive(Debug, Clone, Default)]
pub struct MemberPage {
    /// Members on this page, in upstream order.
    pub members: Vec<Member>,
    /// Number of the following page, `None` on the last one.
    pub next_page: Option<u32>,
}

/// Single-call access to the upstream repository API.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch page `page` (1-based) of the member list.
    async fn fetch_members_page(
        &self,
        entity: &EntityKey,
        page: u32,
    ) -> Result<MemberPage, RemoteError>;

    /// Fetch the remaining call budget.
    async fn fetch_quota(&self) -> Result<Quota, RemoteError>;
}

/// Complete member lists and quota probes, as the orchestrator consumes them.
#[async_trait]
pub trait MemberSource: Send + Sync {
    /// Every current member of `entity`. Any failing page fails the call;
    /// partial lists are never returned.
    async fn fetch_members(
        &self,
        entity: &EntityKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<Member>, RemoteError>;

    /// The remaining call budget.
    async fn fetch_quota(&self, cancel: &CancellationToken) -> Result<Quota, RemoteError>;
}

#[async_trait]
impl<S: MemberSource + ?Sized> MemberSource for Arc<S> {
    async fn fetch_members(
        &self,
        entity: &EntityKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<Member>, RemoteError> {
        (**self).fetch_members(entity, cancel).await
    }

    async fn fetch_quota(&self, cancel: &CancellationToken) -> Result<Quota, RemoteError> {
        (**self).fetch_quota(cancel).await
    }
}

fn request_status(result: &Result<impl Sized, RemoteError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.kind() == RemoteErrorKind::RateLimited => "rate_limited",
        Err(_) => "error",
    }
}

/// Walks the pages of a [`RemoteApi`] until the upstream reports no more.
pub struct PagedClient<A> {
    api: A,
    metrics: Arc<dyn MetricsSink>,
}

impl<A: RemoteApi> PagedClient<A> {
    /// Wrap `api`, recording one request event per upstream call.
    pub fn new(api: A, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { api, metrics }
    }
}

#[async_trait]
impl<A: RemoteApi> MemberSource for PagedClient<A> {
    async fn fetch_members(
        &self,
        entity: &EntityKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<Member>, RemoteError> {
        let mut members = Vec::new();
        let mut page = 1;
        let mut pages = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            let result = self.api.fetch_members_page(entity, page).await;
            self.metrics
                .record_remote_request("stargazers", request_status(&result));
            let fetched = result?;
            pages += 1;

            tracing::trace!(%entity, page, count = fetched.members.len(), "fetched member page");
            members.extend(fetched.members);
            match fetched.next_page {
                None => break,
                Some(next) if next > page => page = next,
                // Following the link could loop forever or skip members.
                Some(next) => {
                    return Err(RemoteError::request(
                        "stargazers",
                        format!("page {page} links back to page {next}"),
                    ));
                }
            }
        }
        tracing::debug!(%entity, pages, count = members.len(), "fetched members");
        Ok(members)
    }

    async fn fetch_quota(&self, cancel: &CancellationToken) -> Result<Quota, RemoteError> {
        if cancel.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        let result = self.api.fetch_quota().await;
        self.metrics
            .record_remote_request("rate_limit", request_status(&result));
        result
    }
}

/// Retries every call of the wrapped source per its [`RetryPolicy`].
///
/// Rate-limited failures are returned at once; cancellation stops retrying.
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: MemberSource> RetryingSource<S> {
    /// Wrap `inner`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: MemberSource> MemberSource for RetryingSource<S> {
    async fn fetch_members(
        &self,
        entity: &EntityKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<Member>, RemoteError> {
        retry_with_backoff(&self.policy, cancel, move |_| {
            self.inner.fetch_members(entity, cancel)
        })
        .await
    }

    async fn fetch_quota(&self, cancel: &CancellationToken) -> Result<Quota, RemoteError> {
        retry_with_backoff(&self.policy, cancel, move |_| self.inner.fetch_quota(cancel)).await
    }
}

/// Build the production member source for `settings`:
/// `RetryingSource(PagedClient(GitHubApi))`.
///
/// # Errors
///
/// Fails when the HTTP client cannot be constructed.
pub fn build_source(
    settings: &Settings,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Arc<dyn MemberSource>, RemoteError> {
    let api = GitHubApi::new(&settings.github)?;
    Ok(Arc::new(RetryingSource::new(
        PagedClient::new(api, metrics),
        settings.github.retry_policy(),
    )))
}
