//! Operational HTTP surface: health, metrics and status.

use super::Orchestrator;
use super::orchestrator::ServiceStatus;
use crate::error::ServiceError;
use crate::metrics::ServiceMetrics;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const OPENMETRICS: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<ServiceMetrics>,
}

/// Routes: `GET /health`, `GET /metrics`, `GET /status`.
pub fn router(orchestrator: Arc<Orchestrator>, metrics: Arc<ServiceMetrics>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(scrape))
        .route("/status", get(status))
        .with_state(AppState {
            orchestrator,
            metrics,
        })
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

/// GET /metrics
async fn scrape(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, OPENMETRICS)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.orchestrator.status())
}

/// Bind the listener. Failing to bind is fatal at startup.
pub async fn bind(addr: &str) -> Result<TcpListener, ServiceError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serve `router` until `shutdown` fires, then drain open connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ReloaderBuilder;
    use crate::metrics::MetricsSink;
    use crate::sources::InlineSource;
    use crate::store::MemoryStateStore;
    use crate::testing::{FakeFactory, FakeSource};

    async fn spawn_server() -> (String, CancellationToken, tokio::task::JoinHandle<std::io::Result<()>>) {
        let reloader = Arc::new(
            ReloaderBuilder::new()
                .with_source(InlineSource::yaml(
                    "repositories:\n  - owner: o\n    repo: r\n  - owner: o\n    repo: s\n",
                ))
                .build()
                .unwrap(),
        );
        let metrics = Arc::new(ServiceMetrics::new());
        metrics.record_notification("discord", "success");
        let shutdown = CancellationToken::new();
        let orchestrator = Arc::new(
            Orchestrator::new(
                reloader,
                Arc::new(MemoryStateStore::new()),
                Arc::new(FakeFactory::new(Arc::new(FakeSource::default()), vec![])),
                metrics.clone(),
                shutdown.clone(),
            )
            .unwrap(),
        );

        let listener = bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(serve(listener, router(orchestrator, metrics), shutdown.clone()));
        (base, shutdown, task)
    }

    #[tokio::test]
    async fn test_endpoints() {
        let (base, shutdown, task) = spawn_server().await;
        let client = reqwest::Client::new();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert_eq!(health.text().await.unwrap(), "OK");

        let scrape = client.get(format!("{base}/metrics")).send().await.unwrap();
        assert_eq!(scrape.status(), 200);
        assert!(
            scrape.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("application/openmetrics-text")
        );
        assert!(scrape.text().await.unwrap().contains("starwatch_notifications_total"));

        let status: serde_json::Value = client
            .get(format!("{base}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["entities"], 2);
        assert_eq!(status["running"], false);
        assert_eq!(status["check_interval_secs"], 3600);

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = bind(&addr).await.unwrap_err();
        assert!(matches!(err, ServiceError::Bind { addr: ref a, .. } if *a == addr));
    }
}
