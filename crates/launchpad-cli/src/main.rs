use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use launchpad_core::impls::{
    DockerConfig, DockerRuntime, GithubCatalog, InMemoryHistoryStore, JsonlHistoryStore,
};
use launchpad_core::ports::clock::SystemClock;
use launchpad_core::ports::history_store::HistoryStore;
use launchpad_core::ports::runtime::ContainerRuntime;
use launchpad_core::retry::BackoffPolicy;
use launchpad_core::{Config, InactivityMonitor, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();

    let docker = Arc::new(DockerRuntime::new(DockerConfig {
        stop_grace: config.stop_grace,
        start_confirmation: BackoffPolicy::start_confirmation(),
    }));
    docker
        .ensure_available()
        .await
        .context("container engine is not reachable")?;

    let history: Arc<dyn HistoryStore> = match &config.history_path {
        Some(path) => {
            info!(path = %path.display(), "using durable history log");
            Arc::new(
                JsonlHistoryStore::open(path)
                    .await
                    .context("open history log")?,
            )
        }
        None => Arc::new(InMemoryHistoryStore::new()),
    };

    let mut orchestrator = Orchestrator::new(config, docker, history, Arc::new(SystemClock));
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
        orchestrator = orchestrator.with_catalog(Arc::new(GithubCatalog::new(Some(token))));
    }
    let orchestrator = Arc::new(orchestrator);

    // The registry is in-memory: after a restart it must be rebuilt from
    // open history entries and verified against the engine.
    let report = orchestrator
        .reconcile()
        .await
        .context("startup reconciliation")?;
    info!(
        adopted = report.adopted,
        stopped = report.stopped,
        failed = report.failed,
        "registry reconciled against runtime state"
    );

    let monitor = InactivityMonitor::spawn(Arc::clone(&orchestrator));

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("shutting down; running containers are left as-is");
    monitor.shutdown_and_join().await;

    Ok(())
}
