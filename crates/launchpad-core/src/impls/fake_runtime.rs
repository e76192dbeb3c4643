//! Scriptable in-memory runtime for exercising the orchestrator without a
//! container engine.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::app::RepoRef;
use crate::domain::errors::RuntimeError;
use crate::ports::runtime::{ContainerRuntime, ContainerStatus, RunSpec};

#[derive(Default)]
struct FakeState {
    next_container: u64,
    /// Containers the fake engine currently knows about.
    containers: HashMap<String, ContainerStatus>,
    build_delay: Option<std::time::Duration>,
    fail_next_build: Option<String>,
    fail_next_run: Option<String>,
    failing_stops: u32,
    stop_failure_diag: String,
    build_calls: Vec<String>,
    run_calls: Vec<RunSpec>,
    stop_calls: Vec<String>,
}

/// In-memory `ContainerRuntime`: containers are rows in a map, failures are
/// scripted per call.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `build` take this long (simulates a slow image build).
    pub fn delay_builds(&self, delay: std::time::Duration) {
        self.state.lock().unwrap().build_delay = Some(delay);
    }

    /// Make the next `build` fail with the given engine diagnostic.
    pub fn fail_next_build(&self, diag: &str) {
        self.state.lock().unwrap().fail_next_build = Some(diag.to_string());
    }

    /// Make the next `run` fail with the given engine diagnostic.
    pub fn fail_next_run(&self, diag: &str) {
        self.state.lock().unwrap().fail_next_run = Some(diag.to_string());
    }

    /// Make the next `n` stop calls fail with the given diagnostic.
    pub fn fail_stops(&self, n: u32, diag: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_stops = n;
        state.stop_failure_diag = diag.to_string();
    }

    /// Mark a container dead without removing it (a crashed process the
    /// engine still reports).
    pub fn kill(&self, container_id: &str) {
        if let Some(status) = self.state.lock().unwrap().containers.get_mut(container_id) {
            status.alive = false;
        }
    }

    /// Drop a container entirely, as if it was removed out-of-band.
    pub fn forget(&self, container_id: &str) {
        self.state.lock().unwrap().containers.remove(container_id);
    }

    pub fn is_alive(&self, container_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .is_some_and(|s| s.alive)
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub fn build_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().build_calls.clone()
    }

    pub fn run_calls(&self) -> Vec<RunSpec> {
        self.state.lock().unwrap().run_calls.clone()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().stop_calls.clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ensure_available(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn build(&self, source: &RepoRef) -> Result<String, RuntimeError> {
        // The guard is dropped before any await point.
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.build_calls.push(source.as_str().to_string());
            let result = match state.fail_next_build.take() {
                Some(diag) => Err(RuntimeError::Engine(diag)),
                None => Ok(format!("fake/{}:latest", state.build_calls.len())),
            };
            (state.build_delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn run(&self, spec: RunSpec) -> Result<String, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.run_calls.push(spec.clone());
        if let Some(diag) = state.fail_next_run.take() {
            return Err(RuntimeError::Engine(diag));
        }
        state.next_container += 1;
        let container_id = format!("ctr-{}", state.next_container);
        state.containers.insert(
            container_id.clone(),
            ContainerStatus {
                alive: true,
                host_port: Some(spec.host_port),
            },
        );
        Ok(container_id)
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerStatus, RuntimeError> {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(container_id)
            .cloned()
            .ok_or_else(|| RuntimeError::Engine(format!("no such container: {container_id}")))
    }

    async fn stop(&self, container_id: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls.push(container_id.to_string());
        if state.failing_stops > 0 {
            state.failing_stops -= 1;
            return Err(RuntimeError::Engine(state.stop_failure_diag.clone()));
        }
        state.containers.remove(container_id);
        Ok(())
    }

    async fn logs(&self, container_id: &str, _tail: usize) -> Result<Vec<u8>, RuntimeError> {
        let state = self.state.lock().unwrap();
        if !state.containers.contains_key(container_id) {
            return Err(RuntimeError::Engine(format!(
                "no such container: {container_id}"
            )));
        }
        Ok(format!("logs for {container_id}\n").into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::runtime::ResourceLimits;

    fn spec(port: u16) -> RunSpec {
        RunSpec {
            container_name: format!("launchpad-test-{port}"),
            image: "fake/1:latest".to_string(),
            host_port: port,
            container_port: 8000,
            limits: ResourceLimits::default(),
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn run_then_inspect_reports_alive() {
        let runtime = FakeRuntime::new();
        let id = runtime.run(spec(8100)).await.unwrap();

        let status = runtime.inspect(&id).await.unwrap();
        assert!(status.alive);
        assert_eq!(status.host_port, Some(8100));
    }

    #[tokio::test]
    async fn scripted_failures_fire_once() {
        let runtime = FakeRuntime::new();
        let repo = RepoRef::parse("https://github.com/u/app").unwrap();

        runtime.fail_next_build("boom");
        assert!(runtime.build(&repo).await.is_err());
        assert!(runtime.build(&repo).await.is_ok());
    }

    #[tokio::test]
    async fn stop_removes_the_container() {
        let runtime = FakeRuntime::new();
        let id = runtime.run(spec(8100)).await.unwrap();
        runtime.stop(&id).await.unwrap();
        assert!(runtime.inspect(&id).await.is_err());
    }

    #[tokio::test]
    async fn killed_container_is_reported_dead_not_missing() {
        let runtime = FakeRuntime::new();
        let id = runtime.run(spec(8100)).await.unwrap();
        runtime.kill(&id);
        let status = runtime.inspect(&id).await.unwrap();
        assert!(!status.alive);
    }
}
