//! Building the member source and providers from a snapshot.

use crate::core::Settings;
use crate::delivery::{self, HttpTransport, Provider};
use crate::error::ServiceError;
use crate::metrics::MetricsSink;
use crate::remote::{self, MemberSource};
use std::sync::Arc;

/// Turns a configuration snapshot into the objects that talk to the outside.
///
/// The orchestrator calls it at construction and again when a reload
/// changes credentials or provider settings.
pub trait ComponentFactory: Send + Sync {
    /// The member source for `settings.github`.
    fn member_source(&self, settings: &Settings) -> Result<Arc<dyn MemberSource>, ServiceError>;

    /// One decorated provider per enabled notification entry.
    fn providers(&self, settings: &Settings) -> Result<Vec<Arc<dyn Provider>>, ServiceError>;
}

/// Production factory: GitHub over HTTP and webhook providers.
pub struct HttpComponentFactory {
    metrics: Arc<dyn MetricsSink>,
}

impl HttpComponentFactory {
    /// Components built by this factory record into `metrics`.
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self { metrics }
    }
}

impl ComponentFactory for HttpComponentFactory {
    fn member_source(&self, settings: &Settings) -> Result<Arc<dyn MemberSource>, ServiceError> {
        remote::build_source(settings, Arc::clone(&self.metrics))
            .map_err(|e| ServiceError::Components(e.to_string()))
    }

    fn providers(&self, settings: &Settings) -> Result<Vec<Arc<dyn Provider>>, ServiceError> {
        let transport = HttpTransport::new(settings.delivery.timeout())
            .map_err(|e| ServiceError::Components(e.to_string()))?;
        Ok(delivery::build_providers(
            settings,
            Arc::new(transport),
            Arc::clone(&self.metrics),
        ))
    }
}
