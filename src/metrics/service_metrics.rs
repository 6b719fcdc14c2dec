//! Prometheus metrics for the service.

use super::MetricsSink;
use crate::model::{EntityKey, Quota};
use chrono::{DateTime, Utc};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RepoLabels {
    owner: String,
    repo: String,
}

impl From<&EntityKey> for RepoLabels {
    fn from(entity: &EntityKey) -> Self {
        Self {
            owner: entity.namespace.clone(),
            repo: entity.name.clone(),
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct CheckLabels {
    owner: String,
    repo: String,
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorTypeLabels {
    error_type: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EndpointLabels {
    endpoint: String,
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ProviderLabels {
    provider: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ProviderStatusLabels {
    provider: String,
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ProviderErrorLabels {
    provider: String,
    error_type: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReloadLabels {
    result: String,
}

/// Prometheus registry for the service, prefixed `starwatch`.
///
/// Every metric uses atomics, so recording only needs `&self`; share it
/// behind an `Arc`.
pub struct ServiceMetrics {
    registry: Registry,
    stars: Family<RepoLabels, Gauge>,
    new_stars: Family<RepoLabels, Counter>,
    check_duration: Family<RepoLabels, Histogram>,
    last_check: Family<RepoLabels, Gauge>,
    checks: Family<CheckLabels, Counter>,
    check_errors: Family<ErrorTypeLabels, Counter>,
    remote_requests: Family<EndpointLabels, Counter>,
    quota_limit: Gauge,
    quota_remaining: Gauge,
    quota_reset: Gauge,
    notifications: Family<ProviderStatusLabels, Counter>,
    notification_errors: Family<ProviderErrorLabels, Counter>,
    notification_latency: Family<ProviderLabels, Histogram>,
    config_reloads: Family<ReloadLabels, Counter>,
    uptime: Gauge<f64, AtomicU64>,
}

impl ServiceMetrics {
    /// Create the registry with every metric registered.
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("starwatch");

        let stars = Family::<RepoLabels, Gauge>::default();
        registry.register("stars", "Current number of stargazers", stars.clone());

        let new_stars = Family::<RepoLabels, Counter>::default();
        registry.register("new_stars", "Stargazers detected as new", new_stars.clone());

        let check_duration = Family::<RepoLabels, Histogram>::new_with_constructor(|| {
            // 50ms to ~100s
            Histogram::new(exponential_buckets(0.05, 2.0, 12))
        });
        registry.register(
            "check_duration_seconds",
            "Duration of one repository check",
            check_duration.clone(),
        );

        let last_check = Family::<RepoLabels, Gauge>::default();
        registry.register(
            "last_check_timestamp_seconds",
            "Unix time of the last successful check",
            last_check.clone(),
        );

        let checks = Family::<CheckLabels, Counter>::default();
        registry.register("checks", "Repository checks by outcome", checks.clone());

        let check_errors = Family::<ErrorTypeLabels, Counter>::default();
        registry.register(
            "check_errors",
            "Failed repository checks by error type",
            check_errors.clone(),
        );

        let remote_requests = Family::<EndpointLabels, Counter>::default();
        registry.register(
            "remote_requests",
            "Upstream API calls by endpoint and outcome",
            remote_requests.clone(),
        );

        let quota_limit = Gauge::default();
        registry.register(
            "remote_quota_limit",
            "Upstream calls allowed per window",
            quota_limit.clone(),
        );

        let quota_remaining = Gauge::default();
        registry.register(
            "remote_quota_remaining",
            "Upstream calls left in the current window",
            quota_remaining.clone(),
        );

        let quota_reset = Gauge::default();
        registry.register(
            "remote_quota_reset_timestamp_seconds",
            "Unix time the upstream quota window resets",
            quota_reset.clone(),
        );

        let notifications = Family::<ProviderStatusLabels, Counter>::default();
        registry.register(
            "notifications",
            "Delivery attempts by provider and outcome",
            notifications.clone(),
        );

        let notification_errors = Family::<ProviderErrorLabels, Counter>::default();
        registry.register(
            "notification_errors",
            "Deliveries and probes that failed after retries",
            notification_errors.clone(),
        );

        let notification_latency = Family::<ProviderLabels, Histogram>::new_with_constructor(|| {
            // 10ms to ~40s
            Histogram::new(exponential_buckets(0.01, 2.0, 13))
        });
        registry.register(
            "notification_latency_seconds",
            "Latency of one delivery including retries",
            notification_latency.clone(),
        );

        let config_reloads = Family::<ReloadLabels, Counter>::default();
        registry.register(
            "config_reloads",
            "Configuration reload attempts by result",
            config_reloads.clone(),
        );

        let uptime = Gauge::<f64, AtomicU64>::default();
        registry.register("uptime_seconds", "Seconds since the service started", uptime.clone());

        let start_time = Gauge::<i64>::default();
        start_time.set(Utc::now().timestamp());
        registry.register(
            "start_time_seconds",
            "Unix time the service started",
            start_time,
        );

        Self {
            registry,
            stars,
            new_stars,
            check_duration,
            last_check,
            checks,
            check_errors,
            remote_requests,
            quota_limit,
            quota_remaining,
            quota_reset,
            notifications,
            notification_errors,
            notification_latency,
            config_reloads,
            uptime,
        }
    }

    /// Render every metric in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn as_gauge(value: impl TryInto<i64>) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

impl MetricsSink for ServiceMetrics {
    fn record_check(&self, entity: &EntityKey, status: &str) {
        self.checks
            .get_or_create(&CheckLabels {
                owner: entity.namespace.clone(),
                repo: entity.name.clone(),
                status: status.to_string(),
            })
            .inc();
    }

    fn record_check_error(&self, error_type: &str) {
        self.check_errors
            .get_or_create(&ErrorTypeLabels {
                error_type: error_type.to_string(),
            })
            .inc();
    }

    fn observe_check_duration(&self, entity: &EntityKey, elapsed: Duration) {
        self.check_duration
            .get_or_create(&entity.into())
            .observe(elapsed.as_secs_f64());
    }

    fn set_member_count(&self, entity: &EntityKey, count: usize) {
        self.stars.get_or_create(&entity.into()).set(as_gauge(count));
    }

    fn record_new_members(&self, entity: &EntityKey, count: usize) {
        self.new_stars
            .get_or_create(&entity.into())
            .inc_by(count as u64);
    }

    fn set_last_check(&self, entity: &EntityKey, at: DateTime<Utc>) {
        self.last_check
            .get_or_create(&entity.into())
            .set(at.timestamp());
    }

    fn record_remote_request(&self, endpoint: &str, status: &str) {
        self.remote_requests
            .get_or_create(&EndpointLabels {
                endpoint: endpoint.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    fn set_quota(&self, quota: &Quota) {
        self.quota_limit.set(as_gauge(quota.limit));
        self.quota_remaining.set(as_gauge(quota.remaining));
        self.quota_reset.set(quota.reset_at.timestamp());
    }

    fn record_notification(&self, provider: &str, status: &str) {
        self.notifications
            .get_or_create(&ProviderStatusLabels {
                provider: provider.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    fn record_notification_error(&self, provider: &str, error_type: &str) {
        self.notification_errors
            .get_or_create(&ProviderErrorLabels {
                provider: provider.to_string(),
                error_type: error_type.to_string(),
            })
            .inc();
    }

    fn observe_notification_latency(&self, provider: &str, elapsed: Duration) {
        self.notification_latency
            .get_or_create(&ProviderLabels {
                provider: provider.to_string(),
            })
            .observe(elapsed.as_secs_f64());
    }

    fn record_config_reload(&self, result: &str) {
        self.config_reloads
            .get_or_create(&ReloadLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn set_uptime(&self, uptime: Duration) {
        self.uptime.set(uptime.as_secs_f64());
    }
}
