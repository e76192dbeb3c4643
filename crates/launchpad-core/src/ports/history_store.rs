//! History store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::HistoryError;
use crate::domain::history::{HistoryEntry, HistoryStatus};
use crate::domain::ids::HistoryId;

/// Append-only log of deployment attempts, independent of registry lifetime.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a new entry. Entries for successful deploys arrive open
    /// (`stopped_at` unset); failed attempts arrive already finalized.
    async fn record_started(&self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Close an open entry. Finalizing twice is `AlreadyFinalized`: a
    /// finalized entry never changes again.
    async fn finalize(
        &self,
        id: HistoryId,
        stopped_at: DateTime<Utc>,
        status: HistoryStatus,
    ) -> Result<(), HistoryError>;

    /// Most recent entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Entries with `stopped_at` unset, oldest first. Feeds startup
    /// reconciliation.
    async fn open_entries(&self) -> Result<Vec<HistoryEntry>, HistoryError>;
}
