//! Fakes shared by unit tests.

use crate::core::Settings;
use crate::delivery::{Provider, Transport};
use crate::error::{NotifyError, RemoteError, ServiceError, TransportError};
use crate::metrics::MetricsSink;
use crate::model::{EntityKey, Member, Quota};
use crate::remote::MemberSource;
use crate::service::ComponentFactory;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, serde_json::Value)>>,
    failure: Option<TransportError>,
}

impl RecordingTransport {
    pub fn failing(error: TransportError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    pub fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        endpoint: &str,
        message: &serde_json::Value,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .push((endpoint.to_string(), message.clone()));
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Provider that records deliveries and optionally always fails.
pub struct FakeProvider {
    name: String,
    failure: Option<NotifyError>,
    deliveries: Mutex<Vec<(Instant, EntityKey, Vec<u64>)>>,
    probes: AtomicUsize,
}

impl FakeProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failure: None,
            deliveries: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn failing_with(mut self, error: NotifyError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn delivery_times(&self) -> Vec<Instant> {
        self.deliveries.lock().iter().map(|(at, _, _)| *at).collect()
    }

    pub fn delivered_ids(&self) -> Vec<Vec<u64>> {
        self.deliveries
            .lock()
            .iter()
            .map(|(_, _, ids)| ids.clone())
            .collect()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn outcome(&self) -> Result<(), NotifyError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(
        &self,
        entity: &EntityKey,
        members: &[Member],
        _cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        self.deliveries.lock().push((
            Instant::now(),
            entity.clone(),
            members.iter().map(|m| m.id).collect(),
        ));
        self.outcome()
    }

    async fn probe(&self, _cancel: &CancellationToken) -> Result<(), NotifyError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.outcome()
    }
}

/// Member source answering from a fixed table.
#[derive(Default)]
pub struct FakeSource {
    members: Mutex<HashMap<EntityKey, Result<Vec<u64>, RemoteError>>>,
    fetches: Mutex<Vec<(Instant, EntityKey)>>,
}

impl FakeSource {
    pub fn with(self, entity: EntityKey, ids: &[u64]) -> Self {
        self.members.lock().insert(entity, Ok(ids.to_vec()));
        self
    }

    pub fn failing(self, entity: EntityKey, error: RemoteError) -> Self {
        self.members.lock().insert(entity, Err(error));
        self
    }

    pub fn fetches(&self) -> Vec<(Instant, EntityKey)> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl MemberSource for FakeSource {
    async fn fetch_members(
        &self,
        entity: &EntityKey,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Member>, RemoteError> {
        self.fetches.lock().push((Instant::now(), entity.clone()));
        match self.members.lock().get(entity) {
            Some(Ok(ids)) => Ok(ids
                .iter()
                .map(|id| Member::new(*id, format!("user{id}")))
                .collect()),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_quota(&self, _cancel: &CancellationToken) -> Result<Quota, RemoteError> {
        Ok(Quota {
            limit: 5000,
            remaining: 4999,
            reset_at: Utc::now(),
        })
    }
}

/// Metrics sink that counts what it is told.
#[derive(Default)]
pub struct RecordingMetrics {
    notifications: Mutex<HashMap<(String, String), usize>>,
    notification_errors: Mutex<Vec<(String, String)>>,
    latencies: Mutex<HashMap<String, usize>>,
    checks: Mutex<HashMap<(EntityKey, String), usize>>,
    check_errors: Mutex<Vec<String>>,
    new_members: Mutex<HashMap<EntityKey, usize>>,
}

impl RecordingMetrics {
    pub fn notifications(&self, provider: &str, status: &str) -> usize {
        self.notifications
            .lock()
            .get(&(provider.to_string(), status.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn errors(&self, provider: &str) -> Vec<String> {
        self.notification_errors
            .lock()
            .iter()
            .filter(|(p, _)| p == provider)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn latencies(&self, provider: &str) -> usize {
        self.latencies.lock().get(provider).copied().unwrap_or(0)
    }

    pub fn checks(&self, entity: &EntityKey, status: &str) -> usize {
        self.checks
            .lock()
            .get(&(entity.clone(), status.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn check_errors(&self) -> Vec<String> {
        self.check_errors.lock().clone()
    }

    pub fn new_members(&self, entity: &EntityKey) -> usize {
        self.new_members.lock().get(entity).copied().unwrap_or(0)
    }
}

impl MetricsSink for RecordingMetrics {
    fn record_check(&self, entity: &EntityKey, status: &str) {
        *self
            .checks
            .lock()
            .entry((entity.clone(), status.to_string()))
            .or_default() += 1;
    }

    fn record_check_error(&self, error_type: &str) {
        self.check_errors.lock().push(error_type.to_string());
    }

    fn record_new_members(&self, entity: &EntityKey, count: usize) {
        *self.new_members.lock().entry(entity.clone()).or_default() += count;
    }

    fn record_notification(&self, provider: &str, status: &str) {
        *self
            .notifications
            .lock()
            .entry((provider.to_string(), status.to_string()))
            .or_default() += 1;
    }

    fn record_notification_error(&self, provider: &str, error_type: &str) {
        self.notification_errors
            .lock()
            .push((provider.to_string(), error_type.to_string()));
    }

    fn observe_notification_latency(&self, provider: &str, _elapsed: Duration) {
        *self
            .latencies
            .lock()
            .entry(provider.to_string())
            .or_default() += 1;
    }
}

/// Hands out fixed components and counts rebuilds.
pub struct FakeFactory {
    source: Arc<dyn MemberSource>,
    providers: Mutex<Vec<Arc<dyn Provider>>>,
    source_builds: AtomicUsize,
    provider_builds: AtomicUsize,
}

impl FakeFactory {
    pub fn new(source: Arc<dyn MemberSource>, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            source,
            providers: Mutex::new(providers),
            source_builds: AtomicUsize::new(0),
            provider_builds: AtomicUsize::new(0),
        }
    }

    /// Providers handed out by the next build.
    pub fn set_providers(&self, providers: Vec<Arc<dyn Provider>>) {
        *self.providers.lock() = providers;
    }

    pub fn source_builds(&self) -> usize {
        self.source_builds.load(Ordering::SeqCst)
    }

    pub fn provider_builds(&self) -> usize {
        self.provider_builds.load(Ordering::SeqCst)
    }
}

impl ComponentFactory for FakeFactory {
    fn member_source(&self, _settings: &Settings) -> Result<Arc<dyn MemberSource>, ServiceError> {
        self.source_builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.source))
    }

    fn providers(&self, _settings: &Settings) -> Result<Vec<Arc<dyn Provider>>, ServiceError> {
        self.provider_builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.providers.lock().clone())
    }
}
