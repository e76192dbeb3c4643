//! Error taxonomy.
//!
//! Validation, conflict, and not-found errors are returned to the caller
//! immediately and never retried. Runtime errors carry the engine's
//! diagnostic unchanged. Catalog failures are non-fatal to the orchestrator.

use thiserror::Error;

use super::app::AppName;
use super::ids::HistoryId;

/// Failures from the container runtime adapter.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The engine rejected or failed an operation; carries its diagnostic
    /// output verbatim.
    #[error("container engine: {0}")]
    Engine(String),

    /// The engine acknowledged the start but the container never reported
    /// live within the bounded confirmation retries.
    #[error("container did not become live after {attempts} inspect attempts")]
    StartTimeout { attempts: u32 },

    #[error("container engine unavailable: {0}")]
    Unavailable(String),
}

/// Failures from the app catalog. The orchestrator treats all of these
/// uniformly as "catalog unavailable".
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog authentication rejected")]
    Auth,

    #[error("catalog rate limit exceeded")]
    RateLimited,

    #[error("catalog network failure: {0}")]
    Network(String),
}

/// Failures from the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history entry {0} not found")]
    NotFound(HistoryId),

    /// A finalized entry never changes again.
    #[error("history entry {0} is already finalized")]
    AlreadyFinalized(HistoryId),

    #[error("history io: {0}")]
    Io(#[from] std::io::Error),

    #[error("history log corrupt: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the orchestrator façade.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    Validation(String),

    /// An active deployment already exists for the app, or a commit found
    /// its record replaced while the engine ran.
    #[error("deployment already active for '{0}'")]
    Conflict(AppName),

    #[error("no active deployment for '{0}'")]
    NotFound(AppName),

    #[error("no free host port in the pool")]
    PortExhausted,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),
}
