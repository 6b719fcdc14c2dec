//! The running service: orchestrator, reloader and HTTP surface wired
//! together.

mod cadence;
mod factory;
pub mod http;
mod orchestrator;

pub use cadence::CadenceMailbox;
pub use factory::{ComponentFactory, HttpComponentFactory};
pub use orchestrator::{CheckReport, Orchestrator, ServiceStatus};

use crate::core::ConfigReloader;
use crate::error::{ConfigError, ServiceError};
use crate::logging::LogHandle;
use crate::metrics::ServiceMetrics;
use crate::store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the binary runs.
///
/// # Examples
///
/// ```rust,no_run
/// use starwatch::core::ConfigReloader;
/// use starwatch::metrics::ServiceMetrics;
/// use starwatch::service::Service;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), starwatch::error::ServiceError> {
/// let metrics = Arc::new(ServiceMetrics::new());
/// let reloader = Arc::new(
///     ConfigReloader::builder()
///         .with_file("config.yaml")
///         .with_metrics(metrics.clone())
///         .build()?,
/// );
/// let shutdown = CancellationToken::new();
/// let service = Service::new(reloader, metrics, None, shutdown.clone()).await?;
/// service.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Service {
    reloader: Arc<ConfigReloader>,
    metrics: Arc<ServiceMetrics>,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
}

impl Service {
    /// Build the store and components from the live configuration and
    /// subscribe the orchestrator to reloads.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Components`] when the HTTP clients cannot be built.
    pub async fn new(
        reloader: Arc<ConfigReloader>,
        metrics: Arc<ServiceMetrics>,
        log_handle: Option<LogHandle>,
        shutdown: CancellationToken,
    ) -> Result<Self, ServiceError> {
        let settings = reloader.get();
        let store = store::from_settings(&settings.storage);
        let factory = Arc::new(HttpComponentFactory::new(metrics.clone()));

        let mut orchestrator = Orchestrator::new(
            Arc::clone(&reloader),
            store,
            factory,
            metrics.clone(),
            shutdown.clone(),
        )?;
        if let Some(handle) = log_handle {
            orchestrator = orchestrator.with_log_handle(handle);
        }
        let orchestrator = Arc::new(orchestrator);
        orchestrator.register().await;

        Ok(Self {
            reloader,
            metrics,
            orchestrator,
            shutdown,
        })
    }

    /// The orchestrator driving the check loop.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Watch the configuration, serve HTTP and run the check loop until the
    /// shutdown token fires. Then stop the watcher and drain the server.
    ///
    /// # Errors
    ///
    /// Watcher start failures, bind failures and startup failures of the
    /// orchestrator.
    pub async fn run(&self) -> Result<(), ServiceError> {
        match self.reloader.start(&self.shutdown).await {
            Ok(()) => {}
            Err(ConfigError::FeatureNotEnabled(feature)) => {
                tracing::warn!(feature, "automatic configuration reload disabled in this build");
            }
            Err(e) => return Err(e.into()),
        }

        let address = self.reloader.get().server.address();
        let listener = match http::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => {
                self.reloader.stop().await;
                return Err(e);
            }
        };
        let server = tokio::spawn(http::serve(
            listener,
            http::router(Arc::clone(&self.orchestrator), Arc::clone(&self.metrics)),
            self.shutdown.clone(),
        ));

        let result = self.orchestrator.run().await;

        // A failed startup must still bring the server and watcher down.
        self.shutdown.cancel();
        self.reloader.stop().await;
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
            Err(e) => tracing::error!(error = %e, "HTTP server task ended abnormally"),
        }
        tracing::info!("service stopped");
        result
    }
}
