//! Durable history store: a JSON-lines event log.
//!
//! One line per lifecycle event (started / finalized); the file is folded
//! into entries at open. The log outlives the registry, which is what makes
//! startup reconciliation possible after a crash or restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::errors::HistoryError;
use crate::domain::history::{HistoryEntry, HistoryStatus};
use crate::domain::ids::HistoryId;
use crate::ports::history_store::HistoryStore;

/// One line of the on-disk log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LifecycleEvent {
    Started {
        entry: HistoryEntry,
    },
    Finalized {
        id: HistoryId,
        stopped_at: DateTime<Utc>,
        status: HistoryStatus,
    },
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<HistoryEntry>,
    index: HashMap<HistoryId, usize>,
}

impl Inner {
    fn apply(&mut self, event: LifecycleEvent, line_no: usize) -> Result<(), HistoryError> {
        match event {
            LifecycleEvent::Started { entry } => {
                let pos = self.entries.len();
                self.index.insert(entry.id, pos);
                self.entries.push(entry);
                Ok(())
            }
            LifecycleEvent::Finalized {
                id,
                stopped_at,
                status,
            } => {
                let Some(&pos) = self.index.get(&id) else {
                    return Err(HistoryError::Corrupt(format!(
                        "line {line_no}: finalize for unknown entry {id}"
                    )));
                };
                let entry = &mut self.entries[pos];
                if !entry.is_open() {
                    return Err(HistoryError::Corrupt(format!(
                        "line {line_no}: second finalize for entry {id}"
                    )));
                }
                entry.finalize(stopped_at, status);
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    state: Mutex<Inner>,
}

impl JsonlHistoryStore {
    /// Open (or create) the log at `path`, folding existing events into
    /// memory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let mut inner = Inner::default();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                for (i, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let event: LifecycleEvent = serde_json::from_str(line).map_err(|e| {
                        HistoryError::Corrupt(format!("line {}: {e}", i + 1))
                    })?;
                    inner.apply(event, i + 1)?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            state: Mutex::new(inner),
        })
    }

    async fn append(&self, event: &LifecycleEvent) -> Result<(), HistoryError> {
        let line =
            serde_json::to_string(event).map_err(|e| HistoryError::Corrupt(e.to_string()))?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn record_started(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let mut state = self.state.lock().await;
        // Write-ahead: the line lands on disk before memory is updated.
        self.append(&LifecycleEvent::Started {
            entry: entry.clone(),
        })
        .await?;
        let pos = state.entries.len();
        state.index.insert(entry.id, pos);
        state.entries.push(entry);
        Ok(())
    }

    async fn finalize(
        &self,
        id: HistoryId,
        stopped_at: DateTime<Utc>,
        status: HistoryStatus,
    ) -> Result<(), HistoryError> {
        let mut state = self.state.lock().await;
        let Some(&pos) = state.index.get(&id) else {
            return Err(HistoryError::NotFound(id));
        };
        if !state.entries[pos].is_open() {
            return Err(HistoryError::AlreadyFinalized(id));
        }
        self.append(&LifecycleEvent::Finalized {
            id,
            stopped_at,
            status,
        })
        .await?;
        state.entries[pos].finalize(stopped_at, status);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let state = self.state.lock().await;
        Ok(state.entries.iter().rev().take(limit).cloned().collect())
    }

    async fn open_entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let state = self.state.lock().await;
        Ok(state.entries.iter().filter(|e| e.is_open()).cloned().collect())
    }
}
