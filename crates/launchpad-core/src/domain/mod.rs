//! Domain model (ids, app types, deployment records, history, errors).

pub mod app;
pub mod deployment;
pub mod errors;
pub mod history;
pub mod ids;

pub use app::{AppDescriptor, AppName, RepoRef};
pub use deployment::{DeploymentRecord, DeploymentStatus};
pub use errors::{CatalogError, HistoryError, OrchestratorError, RuntimeError};
pub use history::{HistoryEntry, HistoryStatus};
pub use ids::{DeploymentId, HistoryId};
