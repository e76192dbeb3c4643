//! Docker adapter: drives the `docker` CLI.
//!
//! Build strategy detection: a compose file takes precedence over a bare
//! Dockerfile. Remote sources are shallow-cloned into a scratch directory
//! that lives only for the duration of the build.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::app::RepoRef;
use crate::domain::errors::RuntimeError;
use crate::ports::runtime::{ContainerRuntime, ContainerStatus, RunSpec};
use crate::retry::BackoffPolicy;

const COMPOSE_FILES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Seconds the engine waits between SIGTERM and SIGKILL on stop.
    pub stop_grace: Duration,
    pub start_confirmation: BackoffPolicy,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(10),
            start_confirmation: BackoffPolicy::start_confirmation(),
        }
    }
}

pub struct DockerRuntime {
    config: DockerConfig,
}

enum BuildStrategy {
    Compose(PathBuf),
    Dockerfile,
}

impl DockerRuntime {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Run a subprocess; non-zero exit surfaces stderr verbatim as the
    /// engine diagnostic.
    async fn exec(program: &str, args: Vec<String>) -> Result<String, RuntimeError> {
        debug!(program, ?args, "exec");
        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                RuntimeError::Unavailable(format!("failed to invoke {program}: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diag = if stderr.is_empty() {
                format!("{program} exited with {}", output.status)
            } else {
                stderr
            };
            return Err(RuntimeError::Engine(diag));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Clone remote sources into a scratch dir; local paths are used as-is.
    /// The returned guard keeps the scratch dir alive through the build.
    async fn checkout(
        source: &RepoRef,
    ) -> Result<(PathBuf, Option<tempfile::TempDir>), RuntimeError> {
        if !source.is_remote() {
            return Ok((PathBuf::from(source.as_str()), None));
        }
        let scratch = tempfile::tempdir()
            .map_err(|e| RuntimeError::Engine(format!("scratch dir: {e}")))?;
        let target = scratch.path().join("src");
        Self::exec(
            "git",
            vec![
                "clone".to_string(),
                "--depth".to_string(),
                "1".to_string(),
                source.as_str().to_string(),
                target.display().to_string(),
            ],
        )
        .await?;
        Ok((target, Some(scratch)))
    }

    fn detect_strategy(path: &Path) -> Option<BuildStrategy> {
        for name in COMPOSE_FILES {
            let candidate = path.join(name);
            if candidate.is_file() {
                return Some(BuildStrategy::Compose(candidate));
            }
        }
        if path.join("Dockerfile").is_file() {
            return Some(BuildStrategy::Dockerfile);
        }
        None
    }
}

/// Image tag derived from the checkout directory name.
fn image_tag_for(path: &Path) -> String {
    let name: String = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "app".to_string())
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("launchpad/{name}:latest")
}

/// Parse `docker inspect --format '{{.State.Running}}'` output.
fn parse_running(output: &str) -> bool {
    output.trim() == "true"
}

/// Parse the first published host port out of `docker port` output, e.g.
/// `8000/tcp -> 0.0.0.0:8100`.
fn parse_host_port(output: &str) -> Option<u16> {
    output
        .lines()
        .next()?
        .rsplit(':')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_available(&self) -> Result<(), RuntimeError> {
        Self::exec(
            "docker",
            vec![
                "version".to_string(),
                "--format".to_string(),
                "{{.Server.Version}}".to_string(),
            ],
        )
        .await
        .map(drop)
        .map_err(|e| match e {
            RuntimeError::Engine(diag) => RuntimeError::Unavailable(diag),
            other => other,
        })
    }

    async fn build(&self, source: &RepoRef) -> Result<String, RuntimeError> {
        // _scratch (if any) is dropped on return, removing the clone.
        let (path, _scratch) = Self::checkout(source).await?;

        match Self::detect_strategy(&path) {
            Some(BuildStrategy::Compose(file)) => {
                let file = file.display().to_string();
                Self::exec(
                    "docker",
                    vec![
                        "compose".to_string(),
                        "-f".to_string(),
                        file.clone(),
                        "build".to_string(),
                    ],
                )
                .await?;
                let images = Self::exec(
                    "docker",
                    vec![
                        "compose".to_string(),
                        "-f".to_string(),
                        file,
                        "config".to_string(),
                        "--images".to_string(),
                    ],
                )
                .await?;
                images
                    .lines()
                    .next()
                    .map(str::to_string)
                    .ok_or_else(|| {
                        RuntimeError::Engine("compose config reported no images".to_string())
                    })
            }
            Some(BuildStrategy::Dockerfile) => {
                let tag = image_tag_for(&path);
                Self::exec(
                    "docker",
                    vec![
                        "build".to_string(),
                        "-t".to_string(),
                        tag.clone(),
                        path.display().to_string(),
                    ],
                )
                .await?;
                Ok(tag)
            }
            None => Err(RuntimeError::Engine(format!(
                "no compose file or Dockerfile in {}",
                path.display()
            ))),
        }
    }

    async fn run(&self, spec: RunSpec) -> Result<String, RuntimeError> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            spec.container_name.clone(),
            "-p".to_string(),
            format!("{}:{}", spec.host_port, spec.container_port),
            "--memory".to_string(),
            format!("{}m", spec.limits.memory_mb),
            "--cpus".to_string(),
            format!("{}", spec.limits.cpus),
            "--restart".to_string(),
            "no".to_string(),
        ];
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image.clone());

        let container_id = match Self::exec("docker", args).await {
            Ok(id) => id,
            Err(e) => {
                // `docker run` can leave a created-but-dead container behind
                // under the reserved name; clear it so a retry is possible.
                let _ = Self::exec(
                    "docker",
                    vec![
                        "rm".to_string(),
                        "-f".to_string(),
                        spec.container_name.clone(),
                    ],
                )
                .await;
                return Err(e);
            }
        };

        // The engine ack only means the process was spawned; poll until it
        // reports live.
        let policy = &self.config.start_confirmation;
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(policy.next_delay(attempt)).await;
            if let Ok(status) = self.inspect(&container_id).await
                && status.alive
            {
                return Ok(container_id);
            }
        }

        // Exhausted: remove the never-live container so it cannot leak.
        warn!(container = %container_id, "start confirmation exhausted; removing container");
        let _ = Self::exec(
            "docker",
            vec!["rm".to_string(), "-f".to_string(), container_id],
        )
        .await;
        Err(RuntimeError::StartTimeout {
            attempts: policy.max_attempts,
        })
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerStatus, RuntimeError> {
        let running = Self::exec(
            "docker",
            vec![
                "inspect".to_string(),
                "--format".to_string(),
                "{{.State.Running}}".to_string(),
                container_id.to_string(),
            ],
        )
        .await?;
        let alive = parse_running(&running);

        let host_port = if alive {
            Self::exec(
                "docker",
                vec!["port".to_string(), container_id.to_string()],
            )
            .await
            .ok()
            .as_deref()
            .and_then(parse_host_port)
        } else {
            None
        };

        Ok(ContainerStatus { alive, host_port })
    }

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError> {
        // `docker stop -t` sends SIGTERM, then SIGKILL after the grace
        // period. A failure here still leaves `rm -f` as the backstop.
        let grace = self.config.stop_grace.as_secs().to_string();
        if let Err(e) = Self::exec(
            "docker",
            vec![
                "stop".to_string(),
                "-t".to_string(),
                grace,
                container_id.to_string(),
            ],
        )
        .await
        {
            warn!(container = %container_id, error = %e, "graceful stop failed; forcing removal");
        }

        Self::exec(
            "docker",
            vec![
                "rm".to_string(),
                "-f".to_string(),
                container_id.to_string(),
            ],
        )
        .await
        .map(drop)
    }

    async fn logs(&self, container_id: &str, tail: usize) -> Result<Vec<u8>, RuntimeError> {
        let output = Command::new("docker")
            .args(["logs", "--tail", &tail.to_string(), container_id])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RuntimeError::Unavailable(format!("failed to invoke docker: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RuntimeError::Engine(stderr));
        }

        // Container stdout arrives on our stdout, container stderr on our
        // stderr; callers get both.
        let mut bytes = output.stdout;
        bytes.extend_from_slice(&output.stderr);
        Ok(bytes)
    }
}
