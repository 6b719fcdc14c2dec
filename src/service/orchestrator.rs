//! The check loop and the reaction to configuration reloads.

use super::cadence::CadenceMailbox;
use super::factory::ComponentFactory;
use crate::core::ConfigReloader;
use crate::delivery::Provider;
use crate::error::{CheckError, NotifyError, RemoteError, ServiceError};
use crate::logging::LogHandle;
use crate::metrics::MetricsSink;
use crate::model::{EntityKey, Quota};
use crate::notify::{CallbackResult, ReloadEvent};
use crate::remote::MemberSource;
use crate::retry::deadline;
use crate::store::StateStore;
use arc_swap::ArcSwap;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Remaining calls below which a warning is logged.
const LOW_QUOTA: u64 = 10;

const UPTIME_INTERVAL: Duration = Duration::from_secs(30);

/// Objects rebuilt from configuration, swapped as a unit.
struct Components {
    source: Arc<dyn MemberSource>,
    providers: Vec<Arc<dyn Provider>>,
}

/// Outcome of one successful entity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// The entity that was checked.
    pub entity: EntityKey,
    /// Members currently recorded.
    pub total: usize,
    /// Members that were new this cycle.
    pub new_members: usize,
    /// Providers whose delivery failed.
    pub failed_deliveries: usize,
}

/// Snapshot served by `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// True while the check loop runs.
    pub running: bool,
    /// Configured entities.
    pub entities: usize,
    /// Active providers.
    pub providers: usize,
    /// Current cadence.
    pub check_interval_secs: u64,
    /// Time since construction.
    pub uptime_secs: u64,
    /// Last quota reported by the upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<Quota>,
}

/// Runs check cycles at the configured cadence and keeps its components in
/// step with configuration reloads.
///
/// ```text
/// Idle --run--> Running --(tick | cadence change)--> Running
///                  \--shutdown--> Idle
/// ```
pub struct Orchestrator {
    config: Arc<ConfigReloader>,
    store: Arc<dyn StateStore>,
    factory: Arc<dyn ComponentFactory>,
    metrics: Arc<dyn MetricsSink>,
    components: ArcSwap<Components>,
    cadence: CadenceMailbox,
    logging: Option<LogHandle>,
    shutdown: CancellationToken,
    running: AtomicBool,
    started_at: Instant,
    quota: parking_lot::Mutex<Option<Quota>>,
}

impl Orchestrator {
    /// Build the initial components from the live configuration.
    ///
    /// Every blocking wait inside the orchestrator ends when `shutdown`
    /// fires.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Components`] when the factory fails.
    pub fn new(
        config: Arc<ConfigReloader>,
        store: Arc<dyn StateStore>,
        factory: Arc<dyn ComponentFactory>,
        metrics: Arc<dyn MetricsSink>,
        shutdown: CancellationToken,
    ) -> Result<Self, ServiceError> {
        let settings = config.get();
        let components = Components {
            source: factory.member_source(&settings)?,
            providers: factory.providers(&settings)?,
        };
        Ok(Self {
            config,
            store,
            factory,
            metrics,
            components: ArcSwap::from_pointee(components),
            cadence: CadenceMailbox::new(),
            logging: None,
            shutdown,
            running: AtomicBool::new(false),
            started_at: Instant::now(),
            quota: parking_lot::Mutex::new(None),
        })
    }

    /// Apply log level changes from reloads through `handle`.
    pub fn with_log_handle(mut self, handle: LogHandle) -> Self {
        self.logging = Some(handle);
        self
    }

    /// Subscribe to configuration reloads. The callback holds a weak
    /// reference, so it does not keep the orchestrator alive.
    pub async fn register(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.config
            .add_callback(move |event| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(orchestrator) => orchestrator.handle_reload(&event).await,
                        None => Ok(()),
                    }
                }
            })
            .await;
    }

    /// React to a validated configuration change before it goes live.
    ///
    /// Rebuilt components are swapped in before returning, so they are
    /// consistent with the snapshot once it becomes visible. Probe failures
    /// of rebuilt providers are logged and recorded, never fatal.
    async fn handle_reload(&self, event: &ReloadEvent) -> CallbackResult {
        let changes = event.changes;
        let (old, new) = (&event.old, &event.new);
        tracing::info!(facets = ?changes.facets(), "applying configuration change");

        if changes.entities {
            tracing::info!(
                old_count = old.repositories.len(),
                new_count = new.repositories.len(),
                "monitored repositories changed"
            );
        }

        if changes.credentials || changes.providers {
            let current = self.components.load_full();
            let source = if changes.credentials {
                tracing::info!("rebuilding member source");
                self.factory.member_source(new)?
            } else {
                Arc::clone(&current.source)
            };
            let providers = if changes.providers {
                tracing::info!("rebuilding notification providers");
                self.factory.providers(new)?
            } else {
                current.providers.clone()
            };
            self.components.store(Arc::new(Components {
                source,
                providers: providers.clone(),
            }));

            if changes.providers {
                for provider in &providers {
                    match provider.probe(&self.shutdown).await {
                        Ok(()) => {
                            tracing::info!(provider = provider.name(), "provider probe succeeded");
                        }
                        Err(e) => {
                            tracing::error!(provider = provider.name(), error = %e, "provider probe failed");
                        }
                    }
                }
            }
        }

        if changes.log_level {
            tracing::info!(old = old.logging.level.as_str(), new = new.logging.level.as_str(), "log level changed");
            if let Some(handle) = &self.logging {
                if let Err(e) = handle.set_level(new.logging.level) {
                    tracing::warn!(error = %e, "cannot apply new log level");
                }
            }
        }

        if changes.cadence {
            let cadence = new.check_interval();
            tracing::info!(old = ?old.check_interval(), new = ?cadence, "check interval changed");
            self.cadence.signal(cadence);
        }

        Ok(())
    }

    /// Initialize the store, probe every provider and record the quota.
    ///
    /// # Errors
    ///
    /// A store that cannot be initialized or a provider that fails its
    /// probe (after retries).
    pub async fn startup(&self) -> Result<(), ServiceError> {
        self.store.initialize().await?;

        let components = self.components.load_full();
        for provider in &components.providers {
            tracing::info!(provider = provider.name(), "probing provider");
            provider
                .probe(&self.shutdown)
                .await
                .map_err(|source| ServiceError::ProbeFailed {
                    provider: provider.name().to_string(),
                    source,
                })?;
        }

        self.refresh_quota().await;

        let settings = self.config.get();
        tracing::info!(
            repositories = settings.repositories.len(),
            providers = components.providers.len(),
            interval = ?settings.check_interval(),
            "service started"
        );
        Ok(())
    }

    /// Run [`startup`](Self::startup), then check cycles until shutdown.
    ///
    /// The first cycle runs one cadence after the start. A cadence change
    /// restarts the period immediately.
    ///
    /// # Errors
    ///
    /// Only startup failures.
    pub async fn run(&self) -> Result<(), ServiceError> {
        self.startup().await?;
        self.running.store(true, Ordering::SeqCst);

        let mut period = self.config.get().check_interval();
        let mut ticker = tokio::time::interval_at(deadline(Instant::now(), period), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut uptime = tokio::time::interval(UPTIME_INTERVAL);

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle().await;
                    self.refresh_quota().await;
                }
                cadence = self.cadence.recv() => {
                    if cadence != period {
                        tracing::info!(old = ?period, new = ?cadence, "check interval updated");
                        period = cadence;
                        ticker = tokio::time::interval_at(deadline(Instant::now(), period), period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                }
                _ = uptime.tick() => self.metrics.set_uptime(self.started_at.elapsed()),
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("check loop stopped");
        Ok(())
    }

    /// Check every configured entity once, in configuration order. One
    /// entity's failure never stops the others; shutdown stops the cycle.
    pub async fn run_cycle(&self) -> Vec<Result<CheckReport, CheckError>> {
        let settings = self.config.get();
        tracing::info!(repositories = settings.repositories.len(), "starting check cycle");

        let mut results = Vec::with_capacity(settings.repositories.len());
        for entity in &settings.repositories {
            if self.shutdown.is_cancelled() {
                break;
            }
            let result = self.check_entity(entity).await;
            match &result {
                Ok(report) => {
                    self.metrics.record_check(entity, "success");
                    self.metrics.set_last_check(entity, Utc::now());
                    tracing::debug!(%entity, total = report.total, new = report.new_members, "repository checked");
                }
                Err(CheckError::Cancelled) => {
                    tracing::debug!(%entity, "check interrupted by shutdown");
                }
                Err(e) => {
                    self.metrics.record_check(entity, "error");
                    self.metrics.record_check_error(e.error_type());
                    tracing::error!(%entity, error = %e, "repository check failed");
                }
            }
            results.push(result);
        }

        tracing::info!("check cycle completed");
        results
    }

    /// Fetch, diff, deliver, save.
    ///
    /// A failed fetch or diff skips the save so the same members are
    /// detected again next cycle. Delivery failures do not.
    pub async fn check_entity(&self, entity: &EntityKey) -> Result<CheckReport, CheckError> {
        let started = Instant::now();
        let components = self.components.load_full();

        let members = match components.source.fetch_members(entity, &self.shutdown).await {
            Err(RemoteError::Cancelled) => return Err(CheckError::Cancelled),
            result => result?,
        };
        self.metrics.set_member_count(entity, members.len());

        let new = self.store.diff(entity, &members).await?;
        let mut failed_deliveries = 0;
        if !new.is_empty() {
            tracing::info!(%entity, count = new.len(), "new stargazers detected");
            self.metrics.record_new_members(entity, new.len());

            for provider in &components.providers {
                match provider.deliver(entity, &new, &self.shutdown).await {
                    Ok(()) => {}
                    Err(NotifyError::Cancelled) => return Err(CheckError::Cancelled),
                    Err(e) => {
                        failed_deliveries += 1;
                        tracing::warn!(%entity, provider = provider.name(), error = %e, "notification failed");
                    }
                }
            }
        }

        let snapshot = self.store.save(entity, members).await?;
        self.metrics.observe_check_duration(entity, started.elapsed());

        Ok(CheckReport {
            entity: entity.clone(),
            total: snapshot.members.len(),
            new_members: new.len(),
            failed_deliveries,
        })
    }

    async fn refresh_quota(&self) {
        let source = Arc::clone(&self.components.load().source);
        match source.fetch_quota(&self.shutdown).await {
            Ok(quota) => {
                self.metrics.set_quota(&quota);
                tracing::info!(remaining = quota.remaining, limit = quota.limit, reset = %quota.reset_at, "rate limit status");
                if quota.remaining < LOW_QUOTA {
                    tracing::warn!(remaining = quota.remaining, "low API rate limit remaining");
                }
                *self.quota.lock() = Some(quota);
            }
            Err(RemoteError::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "rate limit check failed"),
        }
    }

    /// Current run state for the status endpoint.
    pub fn status(&self) -> ServiceStatus {
        let settings = self.config.get();
        ServiceStatus {
            running: self.running.load(Ordering::SeqCst),
            entities: settings.repositories.len(),
            providers: self.components.load().providers.len(),
            check_interval_secs: settings.check_interval().as_secs(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            quota: *self.quota.lock(),
        }
    }

    /// True while the check loop runs.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
