//! Inactivity monitor: sweeps the registry and stops idle deployments.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::orchestrator::Orchestrator;
use crate::domain::deployment::DeploymentRecord;
use crate::domain::errors::OrchestratorError;
use crate::retry::BackoffPolicy;

/// Handle to the background sweep loop.
/// - `request_shutdown` stops the loop between ticks.
/// - `shutdown_and_join` waits for it to exit.
///
/// Shutting the monitor down does not stop running containers.
pub struct InactivityMonitor {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl InactivityMonitor {
    /// Spawn the loop; tick interval and idle threshold come from the
    /// orchestrator's config.
    pub fn spawn(orchestrator: Arc<Orchestrator>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            monitor_loop(orchestrator, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn monitor_loop(orchestrator: Arc<Orchestrator>, shutdown_rx: &mut watch::Receiver<bool>) {
    let interval = orchestrator.config().sweep_interval;
    info!(interval_secs = interval.as_secs(), "inactivity monitor started");
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                let summary = sweep(&orchestrator).await;
                if summary.stopped + summary.failed > 0 {
                    info!(
                        scanned = summary.scanned,
                        stopped = summary.stopped,
                        failed = summary.failed,
                        "sweep complete"
                    );
                }
            }
        }
    }
    info!("inactivity monitor stopped");
}

/// Counters for one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub scanned: usize,
    pub stopped: usize,
    pub failed: usize,
}

enum ForcedStop {
    Stopped,
    Skipped,
    Exhausted,
}

/// One pass over the Running records. Public so tests and operators can
/// drive a sweep without waiting for the tick.
///
/// The pass snapshots first and holds no lock while acting. A single failed
/// stop never ends the loop: retries are bounded, and exhaustion
/// force-finalizes the record as Failed instead of leaving it Stopping
/// forever.
pub async fn sweep(orchestrator: &Orchestrator) -> SweepSummary {
    let mut summary = SweepSummary::default();
    let now = orchestrator.now();
    let threshold = orchestrator.config().idle_threshold;
    let policy = orchestrator.config().forced_stop.clone();

    for record in orchestrator.running_snapshot().await {
        summary.scanned += 1;
        let Some(container_id) = record.container_id.clone() else {
            continue;
        };

        // Health reconciliation: a Running record whose container is gone
        // is not idle, it is dead.
        let healthy = match orchestrator.runtime().inspect(&container_id).await {
            Ok(status) => status.alive,
            Err(e) => {
                warn!(app = %record.app_name, error = %e, "inspect failed during sweep");
                false
            }
        };
        if !healthy {
            if orchestrator
                .force_fail(&record.app_name, record.id)
                .await
                .is_some()
            {
                summary.failed += 1;
            }
            continue;
        }

        let idle = record.idle_for(now).to_std().unwrap_or_default();
        if idle <= threshold {
            continue;
        }

        info!(app = %record.app_name, idle_secs = idle.as_secs(), "idle past threshold; stopping");
        match stop_with_retry(orchestrator, &record, &policy).await {
            ForcedStop::Stopped => summary.stopped += 1,
            ForcedStop::Skipped => {}
            ForcedStop::Exhausted => {
                if orchestrator
                    .force_fail(&record.app_name, record.id)
                    .await
                    .is_some()
                {
                    summary.failed += 1;
                }
            }
        }
    }
    summary
}

async fn stop_with_retry(
    orchestrator: &Orchestrator,
    record: &DeploymentRecord,
    policy: &BackoffPolicy,
) -> ForcedStop {
    for attempt in 1..=policy.max_attempts {
        match orchestrator.stop(record.app_name.as_str()).await {
            Ok(_) => return ForcedStop::Stopped,
            // A competing deploy claimed the name; no longer ours to reclaim.
            Err(OrchestratorError::Conflict(_)) => return ForcedStop::Skipped,
            Err(e) => {
                warn!(app = %record.app_name, attempt, error = %e, "forced stop failed");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.next_delay(attempt)).await;
                }
            }
        }
    }
    ForcedStop::Exhausted
}
