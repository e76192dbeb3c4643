//! In-memory history store, for development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::errors::HistoryError;
use crate::domain::history::{HistoryEntry, HistoryStatus};
use crate::domain::ids::HistoryId;
use crate::ports::history_store::HistoryStore;

/// Entries in insertion order (which is chronological: ids are minted from
/// the clock that drives the orchestrator).
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record_started(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn finalize(
        &self,
        id: HistoryId,
        stopped_at: DateTime<Utc>,
        status: HistoryStatus,
    ) -> Result<(), HistoryError> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Err(HistoryError::NotFound(id));
        };
        if !entry.is_open() {
            return Err(HistoryError::AlreadyFinalized(id));
        }
        entry.finalize(stopped_at, status);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }

    async fn open_entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().filter(|e| e.is_open()).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::app::{AppName, RepoRef};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn open_entry(app: &str, t: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry::opened(
            HistoryId::generate_at(t),
            AppName::parse(app).unwrap(),
            RepoRef::parse("https://github.com/u/app").unwrap(),
            "ctr-1".to_string(),
            8100,
            t,
        )
    }

    #[tokio::test]
    async fn recent_returns_newest_first() {
        let store = InMemoryHistoryStore::new();
        let t = now();
        store.record_started(open_entry("a", t)).await.unwrap();
        store
            .record_started(open_entry("b", t + chrono::Duration::minutes(1)))
            .await
            .unwrap();

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].app_name.as_str(), "b");
        assert_eq!(recent[1].app_name.as_str(), "a");

        let limited = store.recent(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].app_name.as_str(), "b");
    }

    #[tokio::test]
    async fn finalize_is_exactly_once() {
        let store = InMemoryHistoryStore::new();
        let entry = open_entry("a", now());
        let id = entry.id;
        store.record_started(entry).await.unwrap();

        store
            .finalize(id, now() + chrono::Duration::minutes(5), HistoryStatus::Stopped)
            .await
            .unwrap();

        let err = store
            .finalize(id, now() + chrono::Duration::minutes(6), HistoryStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::AlreadyFinalized(_)));

        // The first finalization stuck.
        let recent = store.recent(1).await.unwrap();
        assert_eq!(recent[0].status, HistoryStatus::Stopped);
    }

    #[tokio::test]
    async fn finalize_unknown_id_is_not_found() {
        let store = InMemoryHistoryStore::new();
        let err = store
            .finalize(HistoryId::generate_at(now()), now(), HistoryStatus::Stopped)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn open_entries_excludes_finalized() {
        let store = InMemoryHistoryStore::new();
        let a = open_entry("a", now());
        let a_id = a.id;
        store.record_started(a).await.unwrap();
        store
            .record_started(open_entry("b", now() + chrono::Duration::minutes(1)))
            .await
            .unwrap();

        store
            .finalize(a_id, now() + chrono::Duration::minutes(2), HistoryStatus::Stopped)
            .await
            .unwrap();

        let open = store.open_entries().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].app_name.as_str(), "b");
    }
}
