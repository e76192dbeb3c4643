//! Container runtime port.
//!
//! The only seam to the execution environment. Implementations must never be
//! invoked while a registry lock is held: callers snapshot, release, call the
//! engine, then re-acquire and commit.

use async_trait::async_trait;

use crate::domain::app::RepoRef;
use crate::domain::errors::RuntimeError;

/// Static per-container resource caps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub memory_mb: u64,
    pub cpus: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpus: 0.5,
        }
    }
}

/// What `inspect` reports about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub alive: bool,
    pub host_port: Option<u16>,
}

/// Everything `run` needs to start one container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub container_name: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub limits: ResourceLimits,
    pub env: Vec<(String, String)>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Probe the engine; `Unavailable` when it cannot be reached.
    async fn ensure_available(&self) -> Result<(), RuntimeError>;

    /// Build an image from the source and return its reference. A compose
    /// file takes precedence over a bare Dockerfile. Engine diagnostics are
    /// surfaced unchanged.
    async fn build(&self, source: &RepoRef) -> Result<String, RuntimeError>;

    /// Start a container and block until the engine reports it live
    /// (bounded inspect retries with backoff). Returns the container id;
    /// `StartTimeout` when confirmation retries are exhausted.
    async fn run(&self, spec: RunSpec) -> Result<String, RuntimeError>;

    /// Used for start confirmation and for periodic health reconciliation.
    async fn inspect(&self, container_id: &str) -> Result<ContainerStatus, RuntimeError>;

    /// Graceful stop, then forced removal once the grace period elapses.
    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Most recent output of the container, stdout and stderr interleaved.
    async fn logs(&self, container_id: &str, tail: usize) -> Result<Vec<u8>, RuntimeError>;
}
