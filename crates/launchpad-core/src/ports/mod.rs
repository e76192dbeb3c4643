//! Ports: the trait seams between the orchestrator core and the outside
//! world (container engine, catalog, history persistence, time).

pub mod catalog;
pub mod clock;
pub mod history_store;
pub mod runtime;

pub use self::catalog::AppCatalog;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::history_store::HistoryStore;
pub use self::runtime::{ContainerRuntime, ContainerStatus, ResourceLimits, RunSpec};
