//! Sending a structured message to a webhook endpoint.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Longest response body kept in a [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Delivers one JSON message to one endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `message` to `endpoint`.
    async fn send(&self, endpoint: &str, message: &serde_json::Value)
    -> Result<(), TransportError>;
}

/// JSON-over-HTTP transport with a per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("starwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &str,
        message: &serde_json::Value,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(endpoint)
            .json(message)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY).to_string(),
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 512), "short");
        assert_eq!(truncate("ééé", 3), "é");
        assert_eq!(truncate(&"x".repeat(600), 512).len(), 512);
    }

    #[tokio::test]
    async fn test_posts_json() {
        let server = MockServer::start().await;
        let message = json!({ "content": "hello" });
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(&message))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        transport
            .send(&format!("{}/hook", server.uri()), &message)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_keeps_body_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("y".repeat(2000)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport
            .send(&server.uri(), &json!({}))
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport
            .send("http://127.0.0.1:1/hook", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
