//! GitHub REST implementation of [`RemoteApi`].

use super::{MemberPage, RemoteApi};
use crate::core::GitHubSettings;
use crate::error::RemoteError;
use crate::model::{EntityKey, Member, Quota};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

/// Members requested per page; the API maximum.
pub const PER_PAGE: u32 = 100;

/// Media type that makes the stargazers endpoint include `starred_at`.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.v3.star+json";

const AGENT: &str = concat!("starwatch/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct StargazerEntry {
    starred_at: Option<DateTime<Utc>>,
    user: StargazerUser,
}

#[derive(Debug, Deserialize)]
struct StargazerUser {
    id: u64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    rate: RateWindow,
}

#[derive(Debug, Deserialize)]
struct RateWindow {
    limit: u64,
    remaining: u64,
    reset: i64,
}

/// Talks to `api.github.com` (or a compatible base URL).
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::core::GitHubSettings;
/// use starwatch::model::EntityKey;
/// use starwatch::remote::{GitHubApi, RemoteApi};
///
/// # async fn example() -> Result<(), starwatch::error::RemoteError> {
/// let api = GitHubApi::new(&GitHubSettings::default())?;
/// let page = api
///     .fetch_members_page(&EntityKey::new("tokio-rs", "tokio"), 1)
///     .await?;
/// println!("{} stargazers on the first page", page.members.len());
/// # Ok(())
/// # }
/// ```
pub struct GitHubApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubApi {
    /// Create a client for `settings`. An empty token means anonymous access.
    ///
    /// # Errors
    ///
    /// Fails if the underlying HTTP client cannot be built.
    pub fn new(settings: &GitHubSettings) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(AGENT)
            .build()
            .map_err(|e| RemoteError::request("client", format!("cannot build HTTP client: {e}")))?;

        let token = Some(settings.token.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url).header(USER_AGENT, AGENT);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }

    async fn send(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::request(endpoint, e))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(RemoteError::Request {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteApi for GitHubApi {
    async fn fetch_members_page(
        &self,
        entity: &EntityKey,
        page: u32,
    ) -> Result<MemberPage, RemoteError> {
        let url = format!(
            "{}/repos/{}/{}/stargazers",
            self.base_url, entity.namespace, entity.name
        );
        let request = self
            .get(&url)
            .header(ACCEPT, STAR_MEDIA_TYPE)
            .query(&[("page", page), ("per_page", PER_PAGE)]);

        let response = self.send("stargazers", request).await?;
        let next_page = next_page(response.headers());
        let entries: Vec<StargazerEntry> = response
            .json()
            .await
            .map_err(|e| RemoteError::request("stargazers", format!("invalid response body: {e}")))?;

        let members = entries
            .into_iter()
            .map(|entry| Member {
                id: entry.user.id,
                login: entry.user.login,
                observed_at: entry.starred_at.unwrap_or_else(Utc::now),
            })
            .collect();

        Ok(MemberPage { members, next_page })
    }

    async fn fetch_quota(&self) -> Result<Quota, RemoteError> {
        let url = format!("{}/rate_limit", self.base_url);
        let response = self.send("rate_limit", self.get(&url)).await?;
        let body: RateLimitResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::request("rate_limit", format!("invalid response body: {e}")))?;

        Ok(Quota {
            limit: body.rate.limit,
            remaining: body.rate.remaining,
            reset_at: DateTime::from_timestamp(body.rate.reset, 0).unwrap_or_else(Utc::now),
        })
    }
}

/// Page number of the `rel="next"` entry of a `Link` header.
fn next_page(headers: &HeaderMap) -> Option<u32> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }
        let url = Url::parse(target.trim().trim_start_matches('<').trim_end_matches('>')).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "page")
            .and_then(|(_, value)| value.parse().ok())
    })
}
