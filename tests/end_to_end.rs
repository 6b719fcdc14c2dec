//! A full check cycle against mocked GitHub and webhook endpoints.

use starwatch::core::ConfigReloader;
use starwatch::error::ServiceError;
use starwatch::metrics::NoopMetrics;
use starwatch::model::{EntityKey, Member};
use starwatch::service::{HttpComponentFactory, Orchestrator};
use starwatch::store::{FileStateStore, StateStore};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stargazers(ids: &[u64]) -> serde_json::Value {
    serde_json::Value::Array(
        ids.iter()
            .map(|id| {
                serde_json::json!({
                    "starred_at": "2024-05-01T12:00:00Z",
                    "user": { "login": format!("user{id}"), "id": id }
                })
            })
            .collect(),
    )
}

fn write_config(dir: &Path, server: &MockServer) -> std::path::PathBuf {
    let config = format!(
        r##"repositories:
  - owner: acme
    repo: rocket
github:
  base_url: {uri}
  max_retries: 0
  retry_backoff_ms: 10
notifications:
  - kind: discord
    enabled: true
    webhook_url: {uri}/discord
  - kind: slack
    enabled: true
    webhook_url: {uri}/slack
    channel: "#stars"
delivery:
  max_retries: 0
  retry_backoff_ms: 10
  rate_limit_seconds: 0
storage:
  type: file
  path: {data}
"##,
        uri = server.uri(),
        data = dir.join("data").display(),
    );
    let path = dir.join("config.yaml");
    fs::write(&path, config).unwrap();
    path
}

async fn orchestrator(config_path: &Path, store: Arc<FileStateStore>) -> Orchestrator {
    let reloader = Arc::new(
        ConfigReloader::builder()
            .with_file(config_path)
            .build()
            .unwrap(),
    );
    Orchestrator::new(
        reloader,
        store,
        Arc::new(HttpComponentFactory::new(Arc::new(NoopMetrics))),
        Arc::new(NoopMetrics),
        CancellationToken::new(),
    )
    .unwrap()
}

fn ids(members: &[Member]) -> HashSet<u64> {
    members.iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn test_cycle_announces_only_new_stargazers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/rocket/stargazers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stargazers(&[1, 2, 3])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &server);
    let entity = EntityKey::new("acme", "rocket");
    let store = Arc::new(FileStateStore::new(dir.path().join("data")));
    store.initialize().await.unwrap();
    store
        .save(&entity, vec![Member::new(1, "user1"), Member::new(2, "user2")])
        .await
        .unwrap();

    let orchestrator = orchestrator(&config_path, store.clone()).await;
    let results = orchestrator.run_cycle().await;

    assert_eq!(results.len(), 1);
    let report = results[0].as_ref().unwrap();
    assert_eq!(report.new_members, 1);
    assert_eq!(report.failed_deliveries, 0);

    let snapshot = store.load(&entity).await.unwrap();
    assert_eq!(ids(&snapshot.members), HashSet::from([1, 2, 3]));
    assert_eq!(
        snapshot.prior.as_deref().map(ids),
        Some(HashSet::from([1, 2]))
    );

    let requests = server.received_requests().await.unwrap();
    let discord = requests
        .iter()
        .find(|r| r.url.path() == "/discord")
        .unwrap();
    let body = String::from_utf8_lossy(&discord.body);
    assert!(body.contains("user3"));
    assert!(!body.contains("user1"));

    let slack = requests.iter().find(|r| r.url.path() == "/slack").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&slack.body).unwrap();
    assert_eq!(body["channel"], "#stars");
}

#[tokio::test]
async fn test_second_cycle_is_quiet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/rocket/stargazers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stargazers(&[7])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &server);
    let store = Arc::new(FileStateStore::new(dir.path().join("data")));
    store.initialize().await.unwrap();
    let orchestrator = orchestrator(&config_path, store).await;

    let first = orchestrator.run_cycle().await;
    let second = orchestrator.run_cycle().await;

    assert_eq!(first[0].as_ref().unwrap().new_members, 1);
    assert_eq!(second[0].as_ref().unwrap().new_members, 0);
}

#[tokio::test]
async fn test_failed_startup_probe_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discord"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_team"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = write_config(dir.path(), &server);
    let store = Arc::new(FileStateStore::new(dir.path().join("data")));
    let orchestrator = orchestrator(&config_path, store).await;

    let err = orchestrator.startup().await.unwrap_err();
    assert!(matches!(err, ServiceError::ProbeFailed { ref provider, .. } if provider == "slack"));
    assert!(!orchestrator.is_running());
}
