//! The configuration snapshot and its sections.

use crate::model::EntityKey;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A complete, validated configuration value.
///
/// Snapshots are immutable: a reload builds a new one and swaps it in
/// wholesale. Every section except `repositories` has defaults.
///
/// ```yaml
/// repositories:
///   - owner: rust-lang
///     repo: rust
/// check:
///   interval_minutes: 30
/// github:
///   token: ghp_xxx
/// notifications:
///   - kind: discord
///     enabled: true
///     webhook_url: https://discord.com/api/webhooks/...
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Monitored repositories, processed in this order. Duplicates are
    /// processed independently.
    pub repositories: Vec<EntityKey>,
    /// Check cadence.
    #[serde(default)]
    pub check: CheckSettings,
    /// Upstream API access.
    #[serde(default)]
    pub github: GitHubSettings,
    /// Notification providers.
    #[serde(default)]
    pub notifications: Vec<ProviderSettings>,
    /// Delivery retry and rate-limit tuning shared by all providers.
    #[serde(default)]
    pub delivery: DeliverySettings,
    /// Operational HTTP surface.
    #[serde(default)]
    pub server: ServerSettings,
    /// Snapshot storage.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Interval between check cycles.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check.interval_minutes.saturating_mul(60))
    }

    /// Providers with `enabled: true`.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        self.notifications.iter().filter(|p| p.enabled)
    }
}

/// `check` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// Minutes between check cycles. At least 1.
    pub interval_minutes: u64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
        }
    }
}

/// `github` section.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// API token. Empty means anonymous access with the lower quota.
    pub token: String,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// API root, overridable for GitHub Enterprise.
    pub base_url: String,
    /// Retries after the first failed call.
    pub max_retries: u32,
    /// Base backoff between retries.
    pub retry_backoff_ms: u64,
}

impl GitHubSettings {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Retry policy for upstream calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            timeout_seconds: 30,
            base_url: "https://api.github.com".to_string(),
            max_retries: 3,
            retry_backoff_ms: 2000,
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("timeout_seconds", &self.timeout_seconds)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

/// Supported webhook flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Discord incoming webhook.
    Discord,
    /// Slack incoming webhook.
    Slack,
}

impl ProviderKind {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Slack => "slack",
        }
    }
}

/// One entry of the `notifications` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Webhook flavour.
    pub kind: ProviderKind,
    /// Name used in logs and metrics. Defaults to the kind.
    #[serde(default)]
    pub name: Option<String>,
    /// Disabled providers are ignored entirely.
    #[serde(default)]
    pub enabled: bool,
    /// Webhook URL. Required when enabled.
    #[serde(default)]
    pub webhook_url: String,
    /// Channel override (Slack only).
    #[serde(default)]
    pub channel: Option<String>,
}

impl ProviderSettings {
    /// Name used in logs and metrics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }
}

/// `delivery` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Retries after the first failed delivery or probe.
    pub max_retries: u32,
    /// Base backoff between retries.
    pub retry_backoff_ms: u64,
    /// Minimum spacing between two deliveries to the same provider.
    pub rate_limit_seconds: u64,
    /// Per-request timeout of the webhook transport.
    pub timeout_seconds: u64,
}

impl DeliverySettings {
    /// Retry policy for deliveries and probes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }

    /// Minimum spacing between deliveries.
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_seconds)
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 2000,
            rate_limit_seconds: 60,
            timeout_seconds: 30,
        }
    }
}

/// `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl ServerSettings {
    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

/// Backing store for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON file per entity.
    #[default]
    File,
    /// Process memory; nothing survives a restart.
    Memory,
}

/// `storage` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Backend.
    #[serde(rename = "type")]
    pub kind: StorageKind,
    /// Directory for the file backend.
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageKind::File,
            path: PathBuf::from("./data"),
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything.
    Trace,
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// `logging` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Verbosity.
    pub level: LogLevel,
    /// Format.
    pub format: LogFormat,
}
