//! In-memory engine for exercising lifecycles without a daemon.
//!
//! [`FakeEngine`] implements [`ContainerEngine`] over a mutex-held state
//! table. Tests script exit codes, exec results, and log lines up front,
//! run the code under test against `&dyn ContainerEngine`, then audit what
//! the engine was asked to do.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use quayside_common::error::{QuaysideError, Result};
use quayside_common::types::{ContainerId, ExecId, NetworkId};

use crate::client::{ContainerEngine, ContainerStatus, ExecResult};
use crate::demux::{StreamKind, encode_frame};
use crate::spec::ContainerSpec;

/// Polling interval while waiting for a scripted exit.
const WAIT_POLL: Duration = Duration::from_millis(2);

/// Lifecycle phase of a fake container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Exited,
}

#[derive(Debug)]
struct FakeContainer {
    name: String,
    spec: ContainerSpec,
    phase: Phase,
    /// Exit code delivered on the next wait, set by scripting or stop.
    pending_exit: Option<i64>,
    exit_code: Option<i64>,
}

#[derive(Debug, Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    removed: Vec<String>,
    execs: HashMap<String, ExecResult>,
    exec_scripts: HashMap<String, VecDeque<ExecResult>>,
    exec_counts: HashMap<String, usize>,
    exit_scripts: HashMap<String, i64>,
    log_scripts: HashMap<String, Vec<String>>,
    start_failures: HashSet<String>,
    build_error: Option<String>,
    volumes: HashSet<String>,
    images: HashSet<String>,
    networks: HashMap<String, String>,
    next_network: usize,
    journal: Vec<String>,
}

/// Scriptable in-memory container engine.
#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- scripting ---------------------------------------------------------

    /// Scripts the exit code the named container reports when waited on.
    ///
    /// Without a script a running container never exits on its own.
    pub fn script_exit(&self, name: &str, code: i64) {
        let mut state = self.lock();
        if let Some(container) = state.containers.values_mut().find(|c| c.name == name) {
            container.pending_exit = Some(code);
        } else {
            drop(state.exit_scripts.insert(name.to_string(), code));
        }
    }

    /// Queues one result for the next exec of `program` (argv\[0\]).
    ///
    /// Execs with no queued result succeed with empty output.
    pub fn script_exec(&self, program: &str, exit_code: i64, output: &str) {
        self.lock()
            .exec_scripts
            .entry(program.to_string())
            .or_default()
            .push_back(ExecResult::new(exit_code, output));
    }

    /// Sets the log lines the named container reports.
    pub fn script_logs(&self, name: &str, lines: &[&str]) {
        drop(self.lock().log_scripts.insert(
            name.to_string(),
            lines.iter().map(|&l| l.to_string()).collect(),
        ));
    }

    /// Makes the next start of the named container fail.
    pub fn fail_start(&self, name: &str) {
        drop(self.lock().start_failures.insert(name.to_string()));
    }

    /// Makes the next image build report an engine-side failure.
    pub fn script_build_error(&self, message: &str) {
        self.lock().build_error = Some(message.to_string());
    }

    // -- auditing ----------------------------------------------------------

    /// Number of containers currently known to the engine.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    /// Names of containers that have been removed, in removal order.
    #[must_use]
    pub fn removed_containers(&self) -> Vec<String> {
        self.lock().removed.clone()
    }

    /// Identifier of the named container, if it exists.
    #[must_use]
    pub fn container_named(&self, name: &str) -> Option<ContainerId> {
        self.lock()
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, _)| ContainerId::new(id.clone()))
    }

    /// Whether the named container exists and is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.lock()
            .containers
            .values()
            .any(|c| c.name == name && c.phase == Phase::Running)
    }

    /// The creation spec recorded for the named container.
    #[must_use]
    pub fn container_spec(&self, name: &str) -> Option<ContainerSpec> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.spec.clone())
    }

    /// How many times `program` has been exec'd.
    #[must_use]
    pub fn exec_count(&self, program: &str) -> usize {
        self.lock().exec_counts.get(program).copied().unwrap_or(0)
    }

    /// Whether the named volume exists.
    #[must_use]
    pub fn volume_exists(&self, name: &str) -> bool {
        self.lock().volumes.contains(name)
    }

    /// Whether the tagged image exists.
    #[must_use]
    pub fn image_exists(&self, tag: &str) -> bool {
        self.lock().images.contains(tag)
    }

    /// Number of networks currently known to the engine.
    #[must_use]
    pub fn network_count(&self) -> usize {
        self.lock().networks.len()
    }

    /// Every operation the engine has served, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<ContainerId> {
        let mut state = self.lock();
        if state.containers.values().any(|c| c.name == name) {
            return Err(QuaysideError::Engine {
                operation: "create container".into(),
                message: format!("container name {name} already in use"),
            });
        }
        let id = ContainerId::generate();
        let pending_exit = state.exit_scripts.remove(name);
        state.journal.push(format!("create {name}"));
        drop(state.containers.insert(
            id.as_str().to_string(),
            FakeContainer {
                name: name.to_string(),
                spec: spec.clone(),
                phase: Phase::Created,
                pending_exit,
                exit_code: None,
            },
        ));
        Ok(id)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        let name = state
            .containers
            .get(id.as_str())
            .map(|c| c.name.clone())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        if state.start_failures.remove(&name) {
            state.journal.push(format!("start {name} refused"));
            return Err(QuaysideError::Engine {
                operation: "start container".into(),
                message: "scripted start failure".into(),
            });
        }
        if let Some(container) = state.containers.get_mut(id.as_str()) {
            container.phase = Phase::Running;
            container.exit_code = None;
        }
        state.journal.push(format!("start {name}"));
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId, _grace: Duration) -> Result<()> {
        let mut state = self.lock();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        if container.phase != Phase::Exited {
            container.phase = Phase::Exited;
            container.exit_code = Some(container.pending_exit.take().unwrap_or(0));
        }
        let name = container.name.clone();
        state.journal.push(format!("stop {name}"));
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        let container = state
            .containers
            .remove(id.as_str())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        state.removed.push(container.name.clone());
        state.journal.push(format!("remove {}", container.name));
        Ok(())
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64> {
        loop {
            {
                let mut state = self.lock();
                let container = state
                    .containers
                    .get_mut(id.as_str())
                    .ok_or_else(|| not_found("container", id.as_str()))?;
                if let Some(code) = container.pending_exit.take() {
                    container.phase = Phase::Exited;
                    container.exit_code = Some(code);
                    let name = container.name.clone();
                    state.journal.push(format!("wait {name}"));
                    return Ok(code);
                }
                if container.phase == Phase::Exited {
                    let code = container.exit_code.unwrap_or(0);
                    let name = container.name.clone();
                    state.journal.push(format!("wait {name}"));
                    return Ok(code);
                }
            }
            tokio::time::sleep(WAIT_POLL).await;
        }
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let state = self.lock();
        let container = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        let status = match container.phase {
            Phase::Created => "created",
            Phase::Running => "running",
            Phase::Exited => "exited",
        };
        Ok(ContainerStatus {
            status: status.to_string(),
            running: container.phase == Phase::Running,
            exit_code: container.exit_code,
        })
    }

    async fn container_logs(&self, id: &ContainerId) -> Result<Vec<u8>> {
        let state = self.lock();
        let container = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        let mut stream = Vec::new();
        if let Some(lines) = state.log_scripts.get(&container.name) {
            for line in lines {
                stream.extend_from_slice(&encode_frame(
                    StreamKind::Stdout,
                    format!("{line}\n").as_bytes(),
                ));
            }
        }
        Ok(stream)
    }

    async fn create_exec(&self, id: &ContainerId, user: &str, cmd: &[String]) -> Result<ExecId> {
        let mut state = self.lock();
        let container = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| not_found("container", id.as_str()))?;
        if container.phase != Phase::Running {
            return Err(QuaysideError::Engine {
                operation: "create exec".into(),
                message: format!("container {} is not running", container.name),
            });
        }
        let name = container.name.clone();
        let program = cmd.first().cloned().unwrap_or_default();
        let result = state
            .exec_scripts
            .get_mut(&program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ExecResult::new(0, ""));
        *state.exec_counts.entry(program.clone()).or_insert(0) += 1;
        state
            .journal
            .push(format!("exec {program} as {user} in {name}"));

        let exec_id = ExecId::generate();
        drop(state.execs.insert(exec_id.as_str().to_string(), result));
        Ok(exec_id)
    }

    async fn start_exec(&self, id: &ExecId) -> Result<Vec<u8>> {
        let state = self.lock();
        let exec = state
            .execs
            .get(id.as_str())
            .ok_or_else(|| not_found("exec", id.as_str()))?;
        Ok(encode_frame(StreamKind::Stdout, exec.output.as_bytes()))
    }

    async fn inspect_exec(&self, id: &ExecId) -> Result<i64> {
        let state = self.lock();
        let exec = state
            .execs
            .get(id.as_str())
            .ok_or_else(|| not_found("exec", id.as_str()))?;
        Ok(exec.exit_code)
    }

    async fn build_image(&self, _context: Vec<u8>, tag: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(message) = state.build_error.take() {
            return Err(QuaysideError::Engine {
                operation: "build image".into(),
                message,
            });
        }
        state.journal.push(format!("build {tag}"));
        drop(state.images.insert(tag.to_string()));
        Ok(())
    }

    async fn remove_image(&self, tag: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.images.remove(tag) {
            return Err(not_found("image", tag));
        }
        state.journal.push(format!("remove-image {tag}"));
        Ok(())
    }

    async fn create_volume(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(format!("volume {name}"));
        drop(state.volumes.insert(name.to_string()));
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.volumes.remove(name) {
            return Err(not_found("volume", name));
        }
        state.journal.push(format!("remove-volume {name}"));
        Ok(())
    }

    async fn create_network(&self, name: &str) -> Result<NetworkId> {
        let mut state = self.lock();
        state.next_network += 1;
        let id = format!("net-{}", state.next_network);
        state.journal.push(format!("network {name}"));
        drop(state.networks.insert(id.clone(), name.to_string()));
        Ok(NetworkId::new(id))
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<()> {
        let mut state = self.lock();
        if state.networks.remove(id.as_str()).is_none() {
            return Err(not_found("network", id.as_str()));
        }
        state.journal.push(format!("remove-network {id}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Free helper functions
// ---------------------------------------------------------------------------

fn not_found(kind: &'static str, id: &str) -> QuaysideError {
    QuaysideError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux;

    fn spec() -> ContainerSpec {
        ContainerSpec::new("qm-devserver:latest")
    }

    #[tokio::test]
    async fn lifecycle_round_trip_leaves_no_containers() {
        let engine = FakeEngine::new();
        let id = engine
            .create_container("qm-a", &spec())
            .await
            .expect("create");
        engine.start_container(&id).await.expect("start");
        assert!(engine.is_running("qm-a"));

        engine
            .stop_container(&id, Duration::from_secs(10))
            .await
            .expect("stop");
        engine.remove_container(&id).await.expect("remove");
        assert_eq!(engine.container_count(), 0);
        assert_eq!(engine.removed_containers(), vec!["qm-a".to_string()]);
    }

    #[tokio::test]
    async fn scripted_exit_is_delivered_through_wait() {
        let engine = FakeEngine::new();
        engine.script_exit("runner", 1);
        let id = engine
            .create_container("runner", &spec())
            .await
            .expect("create");
        engine.start_container(&id).await.expect("start");
        assert_eq!(engine.wait_container(&id).await.expect("wait"), 1);

        let status = engine.inspect_container(&id).await.expect("inspect");
        assert!(!status.running);
        assert_eq!(status.exit_code, Some(1));
    }

    #[tokio::test]
    async fn exec_scripts_pop_in_order_and_default_to_success() {
        let engine = FakeEngine::new();
        engine.script_exec("chkmqready", 1, "");
        engine.script_exec("chkmqready", 0, "");
        let id = engine
            .create_container("qm-b", &spec())
            .await
            .expect("create");
        engine.start_container(&id).await.expect("start");

        for expected in [1, 0, 0] {
            let exec = engine
                .create_exec(&id, "mqm", &["chkmqready".to_string()])
                .await
                .expect("exec create");
            let _output = engine.start_exec(&exec).await.expect("exec start");
            assert_eq!(engine.inspect_exec(&exec).await.expect("inspect"), expected);
        }
        assert_eq!(engine.exec_count("chkmqready"), 3);
    }

    #[tokio::test]
    async fn exec_requires_a_running_container() {
        let engine = FakeEngine::new();
        let id = engine
            .create_container("qm-c", &spec())
            .await
            .expect("create");
        let refused = engine
            .create_exec(&id, "mqm", &["dspmq".to_string()])
            .await;
        assert!(matches!(refused, Err(QuaysideError::Engine { .. })));
    }

    #[tokio::test]
    async fn logs_come_back_as_multiplexed_frames() {
        let engine = FakeEngine::new();
        engine.script_logs("qm-d", &["AMQ5051I: startup", "AMQ5052I: ready"]);
        let id = engine
            .create_container("qm-d", &spec())
            .await
            .expect("create");
        let raw = engine.container_logs(&id).await.expect("logs");
        let text = demux::decode(&raw).expect("decode");
        assert_eq!(text, "AMQ5051I: startup\nAMQ5052I: ready");
    }

    #[tokio::test]
    async fn volume_creation_is_idempotent() {
        let engine = FakeEngine::new();
        engine.create_volume("data").await.expect("first");
        engine.create_volume("data").await.expect("second");
        assert!(engine.volume_exists("data"));
        engine.remove_volume("data").await.expect("remove");
        assert!(matches!(
            engine.remove_volume("data").await,
            Err(QuaysideError::NotFound { kind: "volume", .. })
        ));
    }

    #[tokio::test]
    async fn build_error_scripting_fails_one_build() {
        let engine = FakeEngine::new();
        engine.script_build_error("ADD failed: no source files");
        let failed = engine.build_image(Vec::new(), "scratch:test").await;
        assert!(matches!(failed, Err(QuaysideError::Engine { .. })));
        assert!(!engine.image_exists("scratch:test"));

        engine
            .build_image(Vec::new(), "scratch:test")
            .await
            .expect("second build");
        assert!(engine.image_exists("scratch:test"));
    }

    #[tokio::test]
    async fn unknown_ids_surface_as_not_found() {
        let engine = FakeEngine::new();
        let ghost = ContainerId::new("missing".to_string());
        assert!(matches!(
            engine.start_container(&ghost).await,
            Err(QuaysideError::NotFound { kind: "container", .. })
        ));
        assert!(matches!(
            engine.remove_container(&ghost).await,
            Err(QuaysideError::NotFound { kind: "container", .. })
        ));
    }
}
