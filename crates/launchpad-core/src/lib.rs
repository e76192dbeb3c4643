//! launchpad-core
//!
//! Core building blocks for the launchpad deployment orchestrator: turn a
//! deploy/stop request into container lifecycle operations, track active
//! deployments, reclaim idle ones, and keep an immutable deployment history.
//!
//! - **domain**: ids, app types, deployment records, history, errors
//! - **ports**: trait seams (Clock, ContainerRuntime, HistoryStore, AppCatalog)
//! - **registry / pool / retry**: shared state and policies
//! - **impls**: adapters (Docker CLI, JSONL history, GitHub catalog) plus
//!   in-memory implementations for development and tests
//! - **app**: orchestrator façade, inactivity monitor, reconciliation

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod pool;
pub mod ports;
pub mod registry;
pub mod retry;

pub use app::monitor::{InactivityMonitor, SweepSummary, sweep};
pub use app::orchestrator::{Orchestrator, ReconcileReport, StopOutcome};
pub use config::Config;
pub use registry::DeploymentRegistry;
pub use retry::BackoffPolicy;
