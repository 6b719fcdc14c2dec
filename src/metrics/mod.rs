//! Counters, gauges and histograms describing what the service does.
//!
//! Components record through the [`MetricsSink`] trait so tests and
//! embedders can swap the backend. [`ServiceMetrics`] is the Prometheus
//! implementation scraped from `/metrics`.
//!
//! # Examples
//!
//! ```rust
//! use starwatch::metrics::{MetricsSink, ServiceMetrics};
//!
//! let metrics = ServiceMetrics::new();
//! metrics.record_notification("discord", "success");
//! assert!(metrics.encode().unwrap().contains("starwatch_notifications_total"));
//! ```

mod service_metrics;

pub use service_metrics::ServiceMetrics;

use crate::model::{EntityKey, Quota};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Receiver of service events. Every method defaults to doing nothing.
pub trait MetricsSink: Send + Sync {
    /// One entity check finished with `status` (`success` or `error`).
    fn record_check(&self, _entity: &EntityKey, _status: &str) {}

    /// One entity check failed; `error_type` is a short classification.
    fn record_check_error(&self, _error_type: &str) {}

    /// Wall time of one entity check.
    fn observe_check_duration(&self, _entity: &EntityKey, _elapsed: Duration) {}

    /// Current member count of an entity.
    fn set_member_count(&self, _entity: &EntityKey, _count: usize) {}

    /// Members detected as new during a check.
    fn record_new_members(&self, _entity: &EntityKey, _count: usize) {}

    /// Time of the last successful check of an entity.
    fn set_last_check(&self, _entity: &EntityKey, _at: DateTime<Utc>) {}

    /// One upstream API call; `status` is `success`, `rate_limited` or `error`.
    fn record_remote_request(&self, _endpoint: &str, _status: &str) {}

    /// Latest quota reported by the upstream.
    fn set_quota(&self, _quota: &Quota) {}

    /// One delivery attempt to a provider (`success` or `failed`).
    fn record_notification(&self, _provider: &str, _status: &str) {}

    /// A delivery or probe that failed for good.
    fn record_notification_error(&self, _provider: &str, _error_type: &str) {}

    /// Latency of one logical delivery, retries included.
    fn observe_notification_latency(&self, _provider: &str, _elapsed: Duration) {}

    /// Outcome of a configuration reload attempt.
    fn record_config_reload(&self, _result: &str) {}

    /// Time since the service started.
    fn set_uptime(&self, _uptime: Duration) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}
