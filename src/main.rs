use anyhow::Context;
use clap::Parser;
use starwatch::core::ConfigReloader;
use starwatch::logging;
use starwatch::metrics::ServiceMetrics;
use starwatch::service::Service;
use starwatch::sources::STANDARD_ALIASES;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Announce new GitHub stargazers on Discord and Slack.
#[derive(Debug, Parser)]
#[command(name = "starwatch", version, about)]
struct Cli {
    /// Configuration file (YAML, TOML or JSON).
    #[arg(short, long, env = "STARWATCH_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let metrics = Arc::new(ServiceMetrics::new());
    let builder = STANDARD_ALIASES.iter().fold(
        ConfigReloader::builder()
            .with_file(&cli.config)
            .with_env_overrides("STARWATCH", "__"),
        |builder, (var, key)| builder.with_env_alias(var, key),
    );
    let reloader = Arc::new(
        builder
            .with_metrics(metrics.clone())
            .build()
            .with_context(|| format!("cannot load {}", cli.config.display()))?,
    );

    let settings = reloader.get();
    let log_handle = logging::init_logging(settings.logging.level, settings.logging.format)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "starting starwatch"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let service = Service::new(reloader, metrics, Some(log_handle), shutdown).await?;
    service.run().await?;
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
