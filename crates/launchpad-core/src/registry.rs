//! Deployment registry: the authoritative map of active deployments.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::app::AppName;
use crate::domain::deployment::{DeploymentRecord, DeploymentStatus};
use crate::domain::errors::OrchestratorError;
use crate::domain::ids::{DeploymentId, HistoryId};

/// App name -> current deployment record; the single source of truth for
/// "what is running now".
///
/// Discipline (one coarse lock, held only for map operations):
/// - admissions and claims happen under the lock and double as per-app
///   mutual exclusion: a `Starting` or `Stopping` record blocks competing
///   writers for that name;
/// - engine calls happen with the lock released;
/// - commits re-take the lock and are discarded when the record was
///   replaced or removed in between, checked by `DeploymentId`.
#[derive(Clone, Default)]
pub struct DeploymentRegistry {
    state: Arc<Mutex<HashMap<AppName, DeploymentRecord>>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an active record iff the name is free. This is the admission
    /// that makes a second concurrent deploy of the same app a conflict.
    pub async fn admit(&self, record: DeploymentRecord) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock().await;
        if state.contains_key(&record.app_name) {
            return Err(OrchestratorError::Conflict(record.app_name.clone()));
        }
        state.insert(record.app_name.clone(), record);
        Ok(())
    }

    /// Commit a successful start: Starting -> Running. Discarded (conflict)
    /// when the admitted record is gone or was replaced.
    pub async fn commit_running(
        &self,
        app: &AppName,
        id: DeploymentId,
        container_id: String,
        history_id: HistoryId,
        now: DateTime<Utc>,
    ) -> Result<DeploymentRecord, OrchestratorError> {
        let mut state = self.state.lock().await;
        match state.get_mut(app) {
            Some(rec) if rec.id == id && rec.status == DeploymentStatus::Starting => {
                rec.mark_running(container_id, history_id, now);
                Ok(rec.clone())
            }
            _ => Err(OrchestratorError::Conflict(app.clone())),
        }
    }

    /// Drop a `Starting` record after a failed build/run. True when the
    /// record was still ours to drop.
    pub async fn retract(&self, app: &AppName, id: DeploymentId) -> bool {
        let mut state = self.state.lock().await;
        let ours = state
            .get(app)
            .is_some_and(|rec| rec.id == id && rec.status == DeploymentStatus::Starting);
        if ours {
            state.remove(app);
        }
        ours
    }

    /// Claim an active record for stopping.
    ///
    /// - `Ok(None)`: nothing active; the idempotent-stop no-op.
    /// - `Err(Conflict)`: a build is in flight (`Starting`); it runs to
    ///   completion or failure before the record can be acted on.
    /// - `Ok(Some(..))`: the record is now `Stopping`. A record already
    ///   `Stopping` may be re-claimed, so a retried stop can finish the job
    ///   after an engine failure.
    pub async fn begin_stop(
        &self,
        app: &AppName,
    ) -> Result<Option<DeploymentRecord>, OrchestratorError> {
        let mut state = self.state.lock().await;
        match state.get_mut(app) {
            None => Ok(None),
            Some(rec) if rec.status == DeploymentStatus::Starting => {
                Err(OrchestratorError::Conflict(app.clone()))
            }
            Some(rec) => {
                rec.begin_stopping();
                Ok(Some(rec.clone()))
            }
        }
    }

    /// Commit a completed stop: remove the record (same claim only) and
    /// return it marked `Stopped`.
    pub async fn commit_stopped(
        &self,
        app: &AppName,
        id: DeploymentId,
    ) -> Result<DeploymentRecord, OrchestratorError> {
        let mut state = self.state.lock().await;
        let ours = state
            .get(app)
            .is_some_and(|rec| rec.id == id && rec.status == DeploymentStatus::Stopping);
        if !ours {
            return Err(OrchestratorError::Conflict(app.clone()));
        }
        let mut removed = state.remove(app).expect("checked above");
        removed.mark_stopped();
        Ok(removed)
    }

    /// Force-remove an active record as `Failed` (monitor recovery, health
    /// reconciliation). Returns the removed record, or `None` when the
    /// record is gone or no longer the one identified by `id`.
    pub async fn force_remove_failed(
        &self,
        app: &AppName,
        id: DeploymentId,
    ) -> Option<DeploymentRecord> {
        let mut state = self.state.lock().await;
        if !state.get(app).is_some_and(|rec| rec.id == id) {
            return None;
        }
        let mut removed = state.remove(app).expect("checked above");
        removed.mark_failed();
        Some(removed)
    }

    /// Raise `last_accessed_at` for a Running record. True when applied.
    pub async fn touch(&self, app: &AppName, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        match state.get_mut(app) {
            Some(rec) if rec.status == DeploymentStatus::Running => {
                rec.touch(now);
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, app: &AppName) -> Option<DeploymentRecord> {
        self.state.lock().await.get(app).cloned()
    }

    /// All active records, unordered.
    pub async fn snapshot(&self) -> Vec<DeploymentRecord> {
        self.state.lock().await.values().cloned().collect()
    }

    /// Running records only; the monitor acts on this snapshot with no lock
    /// held.
    pub async fn running(&self) -> Vec<DeploymentRecord> {
        self.state
            .lock()
            .await
            .values()
            .filter(|rec| rec.status == DeploymentStatus::Running)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app::RepoRef;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn admitted(app: &str, port: u16) -> DeploymentRecord {
        DeploymentRecord::admitted(
            DeploymentId::generate_at(now()),
            AppName::parse(app).unwrap(),
            RepoRef::parse("https://github.com/u/app").unwrap(),
            port,
            "localhost",
            now(),
        )
    }

    #[tokio::test]
    async fn second_admission_for_same_app_conflicts() {
        let registry = DeploymentRegistry::new();
        registry.admit(admitted("chatbot", 8100)).await.unwrap();

        let err = registry.admit(admitted("chatbot", 8101)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));

        // The first record is untouched.
        let app = AppName::parse("chatbot").unwrap();
        assert_eq!(registry.get(&app).await.unwrap().host_port, 8100);
    }

    #[tokio::test]
    async fn admissions_for_different_apps_are_independent() {
        let registry = DeploymentRegistry::new();
        registry.admit(admitted("a", 8100)).await.unwrap();
        registry.admit(admitted("b", 8101)).await.unwrap();
        assert_eq!(registry.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn commit_running_promotes_only_the_admitted_record() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();

        let committed = registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap();
        assert_eq!(committed.status, DeploymentStatus::Running);
        assert_eq!(committed.container_id.as_deref(), Some("ctr-1"));
    }

    #[tokio::test]
    async fn commit_running_is_discarded_after_retract() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();

        assert!(registry.retract(&app, id).await);

        let err = registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));
        assert!(registry.get(&app).await.is_none());
    }

    #[tokio::test]
    async fn begin_stop_on_missing_app_is_a_noop() {
        let registry = DeploymentRegistry::new();
        let app = AppName::parse("ghost").unwrap();
        assert!(registry.begin_stop(&app).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn begin_stop_rejects_in_flight_build() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        registry.admit(rec).await.unwrap();

        let err = registry.begin_stop(&app).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Conflict(_)));
    }

    #[tokio::test]
    async fn begin_stop_can_reclaim_a_stopping_record() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();
        registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap();

        let first = registry.begin_stop(&app).await.unwrap().unwrap();
        assert_eq!(first.status, DeploymentStatus::Stopping);

        // A retried stop (after an engine failure) claims it again.
        let second = registry.begin_stop(&app).await.unwrap().unwrap();
        assert_eq!(second.status, DeploymentStatus::Stopping);
        assert_eq!(second.id, first.id);
    }

    #[tokio::test]
    async fn commit_stopped_removes_the_record() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();
        registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap();
        registry.begin_stop(&app).await.unwrap();

        let removed = registry.commit_stopped(&app, id).await.unwrap();
        assert_eq!(removed.status, DeploymentStatus::Stopped);
        assert!(registry.get(&app).await.is_none());
    }

    #[tokio::test]
    async fn touch_applies_only_to_running_records() {
        let registry = DeploymentRegistry::new();
        let rec = admitted("chatbot", 8100);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();

        // Starting: not touchable.
        assert!(!registry.touch(&app, now()).await);

        registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap();
        let later = now() + chrono::Duration::minutes(3);
        assert!(registry.touch(&app, later).await);
        assert_eq!(registry.get(&app).await.unwrap().last_accessed_at, later);
    }

    #[tokio::test]
    async fn running_snapshot_excludes_other_states() {
        let registry = DeploymentRegistry::new();
        let starting = admitted("building", 8100);
        registry.admit(starting).await.unwrap();

        let rec = admitted("chatbot", 8101);
        let app = rec.app_name.clone();
        let id = rec.id;
        registry.admit(rec).await.unwrap();
        registry
            .commit_running(&app, id, "ctr-1".to_string(), HistoryId::generate_at(now()), now())
            .await
            .unwrap();

        let running = registry.running().await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].app_name, app);
    }
}
