//! Deployment history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::app::{AppName, RepoRef};
use super::ids::HistoryId;

/// Status of a history entry. `Running` means the entry is still open;
/// `Stopped`/`Failed` are terminal and final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Running,
    Stopped,
    Failed,
}

impl HistoryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One deployment attempt, as written to the history log.
///
/// `stopped_at` and a terminal status are set exactly once; stores reject a
/// second finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub app_name: AppName,
    pub repository: RepoRef,
    /// Absent for attempts that failed before a container existed.
    pub container_id: Option<String>,
    pub host_port: u16,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: HistoryStatus,
}

impl HistoryEntry {
    /// Open entry for a deployment that reached `Running`.
    pub fn opened(
        id: HistoryId,
        app_name: AppName,
        repository: RepoRef,
        container_id: String,
        host_port: u16,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            app_name,
            repository,
            container_id: Some(container_id),
            host_port,
            started_at,
            stopped_at: None,
            status: HistoryStatus::Running,
        }
    }

    /// Entry for a deploy that never reached `Running`; arrives at the store
    /// already finalized so the failed attempt stays auditable.
    pub fn failed_attempt(
        id: HistoryId,
        app_name: AppName,
        repository: RepoRef,
        host_port: u16,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            app_name,
            repository,
            container_id: None,
            host_port,
            started_at,
            stopped_at: Some(failed_at),
            status: HistoryStatus::Failed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Close the entry. Callers (stores) must check `is_open` first.
    pub fn finalize(&mut self, stopped_at: DateTime<Utc>, status: HistoryStatus) {
        self.stopped_at = Some(stopped_at);
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(now: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry::opened(
            HistoryId::generate_at(now),
            AppName::parse("chatbot").unwrap(),
            RepoRef::parse("https://github.com/u/chatbot").unwrap(),
            "ctr-1".to_string(),
            8100,
            now,
        )
    }

    #[test]
    fn opened_entry_is_open_and_running() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let e = entry(now);
        assert!(e.is_open());
        assert_eq!(e.status, HistoryStatus::Running);
    }

    #[test]
    fn finalize_closes_the_entry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut e = entry(now);
        e.finalize(now + chrono::Duration::minutes(3), HistoryStatus::Stopped);
        assert!(!e.is_open());
        assert_eq!(e.status, HistoryStatus::Stopped);
    }

    #[test]
    fn failed_attempt_arrives_finalized() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let e = HistoryEntry::failed_attempt(
            HistoryId::generate_at(now),
            AppName::parse("chatbot").unwrap(),
            RepoRef::parse("https://github.com/u/chatbot").unwrap(),
            8100,
            now,
            now,
        );
        assert!(!e.is_open());
        assert_eq!(e.status, HistoryStatus::Failed);
        assert!(e.container_id.is_none());
    }

    #[test]
    fn entries_round_trip_through_serde() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let e = entry(now);
        let json = serde_json::to_string(&e).unwrap();
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, e.id);
        assert_eq!(back.status, HistoryStatus::Running);
        assert!(back.is_open());
    }
}
