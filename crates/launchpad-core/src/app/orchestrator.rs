//! Orchestrator façade: the only entry point used by the API layer.
//!
//! Lock discipline for every mutating operation: claim the record under the
//! registry lock, release the lock, call the engine, re-acquire and commit.
//! A commit that finds its record replaced or removed is discarded and the
//! operation reports a conflict instead of corrupting state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::app::{AppDescriptor, AppName, RepoRef};
use crate::domain::deployment::DeploymentRecord;
use crate::domain::errors::{HistoryError, OrchestratorError, RuntimeError};
use crate::domain::history::{HistoryEntry, HistoryStatus};
use crate::domain::ids::{DeploymentId, HistoryId};
use crate::pool::PortPool;
use crate::ports::catalog::AppCatalog;
use crate::ports::clock::Clock;
use crate::ports::history_store::HistoryStore;
use crate::ports::runtime::{ContainerRuntime, RunSpec};
use crate::registry::DeploymentRegistry;

/// What `stop` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Nothing was active for the name; stop is idempotent.
    NotActive,
}

/// Outcome of a startup reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Open entries whose container is still live, re-adopted as Running.
    pub adopted: usize,
    /// Open entries whose container is gone, finalized Stopped.
    pub stopped: usize,
    /// Open entries that could not be verified or re-adopted, finalized
    /// Failed.
    pub failed: usize,
}

pub struct Orchestrator {
    config: Config,
    registry: DeploymentRegistry,
    pool: PortPool,
    runtime: Arc<dyn ContainerRuntime>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    catalog: Option<Arc<dyn AppCatalog>>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        runtime: Arc<dyn ContainerRuntime>,
        history: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = PortPool::new(config.port_range());
        Self {
            registry: DeploymentRegistry::new(),
            pool,
            config,
            runtime,
            history,
            clock,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn AppCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Deploy `repository` as `app_name`. Synchronous: the caller waits for
    /// build + start confirmation.
    pub async fn deploy(
        &self,
        app_name: &str,
        repository: &str,
    ) -> Result<DeploymentRecord, OrchestratorError> {
        let app = AppName::parse(app_name)?;
        let repo = RepoRef::parse(repository)?;
        let now = self.clock.now();

        let Some(port) = self.pool.allocate() else {
            return Err(OrchestratorError::PortExhausted);
        };

        let record = DeploymentRecord::admitted(
            DeploymentId::generate_at(now),
            app.clone(),
            repo.clone(),
            port,
            &self.config.public_host,
            now,
        );
        let deployment_id = record.id;
        if let Err(e) = self.registry.admit(record).await {
            self.pool.release(port);
            return Err(e);
        }
        info!(app = %app, port, "deploy admitted");

        // Engine work runs with no registry lock held.
        let container_id = match self.build_and_run(&app, &repo, port).await {
            Ok(id) => id,
            Err(e) => {
                self.registry.retract(&app, deployment_id).await;
                self.pool.release(port);
                // The attempt stays auditable even though nothing is running.
                self.record_failed_attempt(&app, &repo, port, now).await;
                warn!(app = %app, error = %e, "deploy failed");
                return Err(e.into());
            }
        };

        let history_id = HistoryId::generate_at(self.clock.now());
        match self
            .registry
            .commit_running(
                &app,
                deployment_id,
                container_id.clone(),
                history_id,
                self.clock.now(),
            )
            .await
        {
            Ok(record) => {
                let entry = HistoryEntry::opened(
                    history_id,
                    record.app_name.clone(),
                    record.repository.clone(),
                    container_id,
                    record.host_port,
                    record.started_at,
                );
                self.append_history(entry).await;
                info!(app = %app, url = %record.public_url, "deploy committed");
                Ok(record)
            }
            Err(conflict) => {
                // The admission vanished while the engine ran. Discard the
                // commit and reclaim the container we just started.
                warn!(app = %app, container = %container_id, "deploy commit lost; reclaiming container");
                if let Err(e) = self.runtime.stop(&container_id).await {
                    warn!(app = %app, error = %e, "could not stop orphaned container");
                }
                self.pool.release(port);
                self.record_failed_attempt(&app, &repo, port, now).await;
                Err(conflict)
            }
        }
    }

    async fn build_and_run(
        &self,
        app: &AppName,
        repo: &RepoRef,
        port: u16,
    ) -> Result<String, RuntimeError> {
        let image = self.runtime.build(repo).await?;
        let spec = RunSpec {
            container_name: format!(
                "launchpad-{}-{}",
                app,
                self.clock.now().timestamp_millis()
            ),
            image,
            host_port: port,
            container_port: self.config.container_port,
            limits: self.config.limits,
            env: self.config.container_env.clone(),
        };
        self.runtime.run(spec).await
    }

    /// Stop the deployment for `app_name`. Idempotent: no active record is a
    /// no-op success. `Conflict` while a build is in flight.
    pub async fn stop(&self, app_name: &str) -> Result<StopOutcome, OrchestratorError> {
        let app = AppName::parse(app_name)?;
        let Some(claimed) = self.registry.begin_stop(&app).await? else {
            return Ok(StopOutcome::NotActive);
        };
        let Some(container_id) = claimed.container_id.clone() else {
            // begin_stop rejects Starting, so a claim always carries a
            // container id; refuse rather than guess.
            return Err(OrchestratorError::Runtime(RuntimeError::Engine(
                "active record has no container id".to_string(),
            )));
        };

        if let Err(e) = self.runtime.stop(&container_id).await {
            // The record stays Stopping; a retried stop re-claims it, and
            // the monitor's force path is the backstop.
            warn!(app = %app, error = %e, "engine stop failed");
            return Err(e.into());
        }

        let removed = self.registry.commit_stopped(&app, claimed.id).await?;
        self.pool.release(removed.host_port);
        self.finalize_history(removed.history_id, HistoryStatus::Stopped)
            .await;
        info!(app = %app, "stopped");
        Ok(StopOutcome::Stopped)
    }

    /// Raise `last_accessed_at` to now; called whenever traffic is proxied
    /// to the deployment. No-op (false) if the app is not Running.
    pub async fn touch(&self, app_name: &str) -> bool {
        let Ok(app) = AppName::parse(app_name) else {
            return false;
        };
        self.registry.touch(&app, self.clock.now()).await
    }

    pub async fn status(&self, app_name: &str) -> Result<DeploymentRecord, OrchestratorError> {
        let app = AppName::parse(app_name)?;
        self.registry
            .get(&app)
            .await
            .ok_or(OrchestratorError::NotFound(app))
    }

    pub async fn list_active(&self) -> Vec<DeploymentRecord> {
        self.registry.snapshot().await
    }

    /// Recent container output for an active deployment.
    pub async fn logs(&self, app_name: &str, tail: usize) -> Result<Vec<u8>, OrchestratorError> {
        let app = AppName::parse(app_name)?;
        let record = self
            .registry
            .get(&app)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(app.clone()))?;
        let Some(container_id) = record.container_id else {
            return Err(OrchestratorError::NotFound(app));
        };
        Ok(self.runtime.logs(&container_id, tail).await?)
    }

    /// Most recent deployment attempts first.
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        self.history.recent(limit).await
    }

    /// Catalog listing. Any catalog failure is reported uniformly as
    /// `CatalogUnavailable` and never affects deploy/stop.
    pub async fn catalog_apps(
        &self,
        owner: &str,
    ) -> Result<Vec<AppDescriptor>, OrchestratorError> {
        let Some(catalog) = &self.catalog else {
            return Err(OrchestratorError::Validation(
                "no catalog configured".to_string(),
            ));
        };
        Ok(catalog.list_apps(owner).await?)
    }

    /// Recovery path: drop the identified record as Failed, release its
    /// port, finalize its history entry. No engine call. Used by the
    /// monitor when forced stops are exhausted or a container is gone.
    pub async fn force_fail(
        &self,
        app: &AppName,
        id: DeploymentId,
    ) -> Option<DeploymentRecord> {
        let removed = self.registry.force_remove_failed(app, id).await?;
        self.pool.release(removed.host_port);
        self.finalize_history(removed.history_id, HistoryStatus::Failed)
            .await;
        warn!(app = %app, "deployment force-marked failed");
        Some(removed)
    }

    /// Running records only; the monitor acts on this snapshot without
    /// holding any lock.
    pub async fn running_snapshot(&self) -> Vec<DeploymentRecord> {
        self.registry.running().await
    }

    /// Startup pass: reseed the registry from the history store's open
    /// entries and verify each against the engine. A registry entry is
    /// never assumed Running without `inspect` evidence.
    pub async fn reconcile(&self) -> Result<ReconcileReport, HistoryError> {
        let mut report = ReconcileReport::default();

        for entry in self.history.open_entries().await? {
            let Some(container_id) = entry.container_id.clone() else {
                self.finalize_history(Some(entry.id), HistoryStatus::Failed)
                    .await;
                report.failed += 1;
                continue;
            };

            match self.runtime.inspect(&container_id).await {
                Ok(status) if status.alive => {
                    if self.adopt(&entry, container_id).await {
                        report.adopted += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                Ok(_) => {
                    self.finalize_history(Some(entry.id), HistoryStatus::Stopped)
                        .await;
                    report.stopped += 1;
                }
                Err(e) => {
                    warn!(app = %entry.app_name, error = %e, "inspect failed during reconcile");
                    self.finalize_history(Some(entry.id), HistoryStatus::Failed)
                        .await;
                    report.failed += 1;
                }
            }
        }

        info!(
            adopted = report.adopted,
            stopped = report.stopped,
            failed = report.failed,
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Re-adopt a live container as a Running record. False when the port
    /// or name cannot be claimed; the container is reclaimed instead of
    /// being left unmanaged.
    async fn adopt(&self, entry: &HistoryEntry, container_id: String) -> bool {
        let now = self.clock.now();

        if !self.pool.claim(entry.host_port) {
            warn!(app = %entry.app_name, port = entry.host_port, "port already taken; reclaiming container");
            self.reclaim(entry, &container_id).await;
            return false;
        }

        let mut record = DeploymentRecord::admitted(
            DeploymentId::generate_at(now),
            entry.app_name.clone(),
            entry.repository.clone(),
            entry.host_port,
            &self.config.public_host,
            entry.started_at,
        );
        // Fresh access time: adoption grants a full idle grace period.
        record.mark_running(container_id.clone(), entry.id, now);

        if self.registry.admit(record).await.is_err() {
            warn!(app = %entry.app_name, "name already active; reclaiming container");
            self.pool.release(entry.host_port);
            self.reclaim(entry, &container_id).await;
            return false;
        }

        info!(app = %entry.app_name, port = entry.host_port, "re-adopted running container");
        true
    }

    async fn reclaim(&self, entry: &HistoryEntry, container_id: &str) {
        if let Err(e) = self.runtime.stop(container_id).await {
            warn!(container = %container_id, error = %e, "could not reclaim container");
        }
        self.finalize_history(Some(entry.id), HistoryStatus::Failed)
            .await;
    }

    async fn record_failed_attempt(
        &self,
        app: &AppName,
        repo: &RepoRef,
        port: u16,
        started_at: DateTime<Utc>,
    ) {
        let now = self.clock.now();
        let entry = HistoryEntry::failed_attempt(
            HistoryId::generate_at(now),
            app.clone(),
            repo.clone(),
            port,
            started_at,
            now,
        );
        self.append_history(entry).await;
    }

    async fn append_history(&self, entry: HistoryEntry) {
        if let Err(e) = self.history.record_started(entry).await {
            warn!(error = %e, "history write failed");
        }
    }

    async fn finalize_history(&self, history_id: Option<HistoryId>, status: HistoryStatus) {
        let Some(id) = history_id else { return };
        if let Err(e) = self.history.finalize(id, self.clock.now(), status).await {
            warn!(history_id = %id, error = %e, "history finalize failed");
        }
    }
}
