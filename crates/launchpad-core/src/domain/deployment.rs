//! Deployment record and status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::app::{AppName, RepoRef};
use super::ids::{DeploymentId, HistoryId};

/// Deployment lifecycle states.
///
/// `Starting`/`Running`/`Stopping` are "active": the record holds the app
/// name and a host port. `Stopped`/`Failed` are terminal; terminal records
/// leave the registry immediately, only their history entry survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl DeploymentStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Single source of truth for one active deployment.
///
/// Design:
/// - State transitions go through methods, not field writes.
/// - `id` names this admission, not the app: a later deploy of the same app
///   gets a fresh id, which is what commit conflict checks compare.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub app_name: AppName,
    pub repository: RepoRef,
    /// Engine handle; `None` only while `Starting`.
    pub container_id: Option<String>,
    pub host_port: u16,
    pub public_url: String,
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Open history entry to finalize on stop; set when the record goes
    /// `Running`.
    pub history_id: Option<HistoryId>,
}

impl DeploymentRecord {
    /// A freshly admitted record: port claimed, engine not yet called.
    pub fn admitted(
        id: DeploymentId,
        app_name: AppName,
        repository: RepoRef,
        host_port: u16,
        public_host: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            app_name,
            repository,
            container_id: None,
            host_port,
            public_url: format!("http://{public_host}:{host_port}"),
            status: DeploymentStatus::Starting,
            started_at: now,
            last_accessed_at: now,
            history_id: None,
        }
    }

    /// Starting -> Running, once the engine confirmed the container is live.
    pub fn mark_running(&mut self, container_id: String, history_id: HistoryId, now: DateTime<Utc>) {
        self.container_id = Some(container_id);
        self.history_id = Some(history_id);
        self.status = DeploymentStatus::Running;
        self.last_accessed_at = now;
    }

    /// Claim the record for a stop; the engine call happens afterwards.
    pub fn begin_stopping(&mut self) {
        self.status = DeploymentStatus::Stopping;
    }

    pub fn mark_stopped(&mut self) {
        self.status = DeploymentStatus::Stopped;
    }

    pub fn mark_failed(&mut self) {
        self.status = DeploymentStatus::Failed;
    }

    /// Raise the access time. Never lowers it, and only applies while
    /// `Running`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if self.status == DeploymentStatus::Running && now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_accessed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn record(now: DateTime<Utc>) -> DeploymentRecord {
        DeploymentRecord::admitted(
            DeploymentId::generate_at(now),
            AppName::parse("chatbot").unwrap(),
            RepoRef::parse("https://github.com/u/chatbot").unwrap(),
            8100,
            "localhost",
            now,
        )
    }

    #[test]
    fn admitted_record_derives_url_from_port() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let rec = record(now);
        assert_eq!(rec.status, DeploymentStatus::Starting);
        assert_eq!(rec.public_url, "http://localhost:8100");
        assert!(rec.container_id.is_none());
    }

    #[test]
    fn touch_is_monotonic() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut rec = record(now);
        rec.mark_running("ctr-1".to_string(), HistoryId::generate_at(now), now);

        let later = now + chrono::Duration::minutes(5);
        rec.touch(later);
        assert_eq!(rec.last_accessed_at, later);

        // An older timestamp never lowers the access time.
        rec.touch(now);
        assert_eq!(rec.last_accessed_at, later);
    }

    #[test]
    fn touch_ignored_unless_running() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut rec = record(now);

        rec.touch(now + chrono::Duration::minutes(5));
        assert_eq!(rec.last_accessed_at, now);

        rec.mark_running("ctr-1".to_string(), HistoryId::generate_at(now), now);
        rec.begin_stopping();
        rec.touch(now + chrono::Duration::minutes(10));
        assert_eq!(rec.last_accessed_at, now);
    }

    #[rstest]
    #[case::starting(DeploymentStatus::Starting, true)]
    #[case::running(DeploymentStatus::Running, true)]
    #[case::stopping(DeploymentStatus::Stopping, true)]
    #[case::stopped(DeploymentStatus::Stopped, false)]
    #[case::failed(DeploymentStatus::Failed, false)]
    fn active_statuses(#[case] status: DeploymentStatus, #[case] active: bool) {
        assert_eq!(status.is_active(), active);
    }

    #[test]
    fn idle_for_measures_from_last_access() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut rec = record(now);
        rec.mark_running("ctr-1".to_string(), HistoryId::generate_at(now), now);

        let later = now + chrono::Duration::minutes(16);
        assert_eq!(rec.idle_for(later), chrono::Duration::minutes(16));
    }
}
