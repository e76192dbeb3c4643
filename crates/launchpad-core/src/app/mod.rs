//! Application layer: the orchestrator façade and its background loops.

pub mod monitor;
pub mod orchestrator;

pub use self::monitor::{InactivityMonitor, SweepSummary, sweep};
pub use self::orchestrator::{Orchestrator, ReconcileReport, StopOutcome};
