//! The base provider: renders a payload and hands it to the transport.

use super::message::{DiscordMessage, SlackMessage};
use super::{Provider, Transport};
use crate::core::{ProviderKind, ProviderSettings};
use crate::error::{NotifyError, TransportError};
use crate::model::{EntityKey, Member};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Discord or Slack incoming webhook.
pub struct WebhookProvider {
    name: String,
    kind: ProviderKind,
    endpoint: String,
    channel: Option<String>,
    transport: Arc<dyn Transport>,
}

impl WebhookProvider {
    /// Provider for one `notifications` entry.
    pub fn new(settings: &ProviderSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: settings.display_name().to_string(),
            kind: settings.kind,
            endpoint: settings.webhook_url.clone(),
            channel: settings.channel.clone().filter(|c| !c.is_empty()),
            transport,
        }
    }

    fn encode(&self, message: impl Serialize) -> Result<serde_json::Value, NotifyError> {
        serde_json::to_value(message).map_err(|e| NotifyError::Delivery {
            provider: self.name.clone(),
            source: TransportError::Request(format!("cannot encode message: {e}")),
        })
    }

    async fn send(
        &self,
        message: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(NotifyError::Cancelled),
            result = self.transport.send(&self.endpoint, &message) => result,
        };
        result.map_err(|source| NotifyError::Delivery {
            provider: self.name.clone(),
            source,
        })
    }
}

#[async_trait]
impl Provider for WebhookProvider {
    fn name(&self) -> &str {
        &self.name
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
        let message = match self.kind {
            ProviderKind::Discord => self.encode(DiscordMessage::announcement(entity, members))?,
            ProviderKind::Slack => self.encode(SlackMessage::announcement(
                entity,
                members,
                self.channel.as_deref(),
            ))?,
        };
        self.send(message, cancel).await?;
        tracing::info!(provider = %self.name, %entity, count = members.len(), "notification sent");
        Ok(())
    }

    async fn probe(&self, cancel: &CancellationToken) -> Result<(), NotifyError> {
        let message = match self.kind {
            ProviderKind::Discord => self.encode(DiscordMessage::probe())?,
            ProviderKind::Slack => self.encode(SlackMessage::probe(self.channel.as_deref()))?,
        };
        self.send(message, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn settings(kind: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            kind,
            name: None,
            enabled: true,
            webhook_url: "https://hooks.example.com/abc".to_string(),
            channel: Some("#stars".to_string()),
        }
    }

    #[tokio::test]
    async fn test_no_members_is_a_no_op() {
        let transport = Arc::new(RecordingTransport::default());
        let provider = WebhookProvider::new(&settings(ProviderKind::Discord), transport.clone());

        provider
            .deliver(&EntityKey::new("o", "r"), &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_posts_to_endpoint() {
        let transport = Arc::new(RecordingTransport::default());
        let provider = WebhookProvider::new(&settings(ProviderKind::Slack), transport.clone());
        assert_eq!(provider.name(), "slack");

        provider
            .deliver(
                &EntityKey::new("o", "r"),
                &[Member::new(3, "newcomer")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://hooks.example.com/abc");
        assert_eq!(sent[0].1["channel"], "#stars");
        assert_eq!(sent[0].1["attachments"][0]["fields"][0]["title"], "newcomer");
    }

    #[tokio::test]
    async fn test_probe_and_failure_classification() {
        let transport = Arc::new(RecordingTransport::failing(TransportError::Status {
            status: 404,
            body: "unknown webhook".to_string(),
        }));
        let provider = WebhookProvider::new(&settings(ProviderKind::Discord), transport.clone());

        let err = provider.probe(&CancellationToken::new()).await.unwrap_err();
        match err {
            NotifyError::Delivery { provider, source } => {
                assert_eq!(provider, "discord");
                assert!(matches!(source, TransportError::Status { status: 404, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(transport.sent()[0].1["content"].is_string());
    }
}
