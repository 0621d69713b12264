//! The swappable engine-client boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use quayside_common::error::Result;
use quayside_common::types::{ContainerId, ExecId, NetworkId};

use crate::spec::ContainerSpec;

/// Subset of a container's engine-side state used for teardown logging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerStatus {
    /// Engine state string (`created`, `running`, `exited`, ...).
    #[serde(default)]
    pub status: String,
    /// Whether the main process is currently running.
    #[serde(default)]
    pub running: bool,
    /// Exit code of the main process, when it has exited.
    #[serde(default)]
    pub exit_code: Option<i64>,
}

/// Combined result of one exec invocation: exit code plus captured output.
///
/// Produced fresh per invocation and never cached. Real engines cannot
/// deliver both halves trustworthily over a single invocation (see
/// [`ContainerEngine::start_exec`]); this type is how in-memory engines
/// script what a workload command does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Exit code of the command.
    pub exit_code: i64,
    /// Combined stdout/stderr text.
    pub output: String,
}

impl ExecResult {
    /// Creates a result from an exit code and combined output text.
    #[must_use]
    pub fn new(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }
}

/// One container engine, viewed through the operations the harness needs.
///
/// Implementations own no lifecycle state: every method is a single engine
/// round-trip against resources the caller identifies explicitly. The trait
/// is object-safe so a harness can borrow `&dyn ContainerEngine`; the
/// engine client is an injected dependency, never a process-wide singleton.
///
/// Control-plane calls (create/start/stop/remove/inspect, volume and network
/// management) are expected to finish promptly and implementations may bound
/// them internally. The logically blocking calls ([`wait_container`],
/// [`start_exec`], [`container_logs`], [`build_image`]) are *not* bounded
/// here; callers wrap them in their own deadline, and cancelling such a call
/// never affects the engine-side resource.
///
/// [`wait_container`]: ContainerEngine::wait_container
/// [`start_exec`]: ContainerEngine::start_exec
/// [`container_logs`]: ContainerEngine::container_logs
/// [`build_image`]: ContainerEngine::build_image
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Creates a container named `name` from `spec`, in "created" state.
    ///
    /// # Errors
    ///
    /// Fails if the image is missing, the name collides, or the
    /// specification is invalid.
    async fn create_container(&self, name: &str, spec: &ContainerSpec) -> Result<ContainerId>;

    /// Starts a created (or previously stopped) container.
    ///
    /// # Errors
    ///
    /// Fails on engine rejection, e.g. a port conflict. Starting an
    /// already-running container is not an error.
    async fn start_container(&self, id: &ContainerId) -> Result<()>;

    /// Requests a graceful stop; after `grace` the engine kills the process.
    ///
    /// # Errors
    ///
    /// Fails on engine rejection. Stopping an already-stopped container is
    /// not an error.
    async fn stop_container(&self, id: &ContainerId, grace: Duration) -> Result<()>;

    /// Force-removes the container together with its anonymous volumes.
    ///
    /// # Errors
    ///
    /// Fails if the container does not exist or the engine refuses.
    async fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Blocks until the container's main process exits; returns its code.
    ///
    /// # Errors
    ///
    /// Fails if the container does not exist or the engine connection drops.
    async fn wait_container(&self, id: &ContainerId) -> Result<i64>;

    /// Returns the engine-side state subset for `id`.
    ///
    /// # Errors
    ///
    /// Fails if the container does not exist.
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerStatus>;

    /// Returns the container's console log as a raw multiplexed stream.
    ///
    /// # Errors
    ///
    /// Fails if the container does not exist or the engine refuses.
    async fn container_logs(&self, id: &ContainerId) -> Result<Vec<u8>>;

    /// Registers a command to run inside a running container as `user`.
    ///
    /// # Errors
    ///
    /// Fails if the container is not running.
    async fn create_exec(&self, id: &ContainerId, user: &str, cmd: &[String]) -> Result<ExecId>;

    /// Starts a registered exec and returns its complete multiplexed output.
    ///
    /// The returned stream carries no trustworthy exit code: the engine's
    /// attach path reports success regardless of the real result. Callers
    /// needing the code follow up with [`inspect_exec`](Self::inspect_exec),
    /// which is reliable once this call has drained the stream to its end.
    ///
    /// # Errors
    ///
    /// Fails if the exec is unknown or the engine refuses to start it.
    async fn start_exec(&self, id: &ExecId) -> Result<Vec<u8>>;

    /// Returns the exit code of a finished exec.
    ///
    /// # Errors
    ///
    /// Fails if the exec is unknown.
    async fn inspect_exec(&self, id: &ExecId) -> Result<i64>;

    /// Builds an image named `tag` from a tar build context.
    ///
    /// The engine streams newline-delimited JSON progress while building; an
    /// error message anywhere in that stream aborts the build.
    ///
    /// # Errors
    ///
    /// Fails on engine rejection or a reported build error.
    async fn build_image(&self, context: Vec<u8>, tag: &str) -> Result<()>;

    /// Force-removes an image.
    ///
    /// # Errors
    ///
    /// Fails if the image does not exist.
    async fn remove_image(&self, tag: &str) -> Result<()>;

    /// Creates a named local volume.
    ///
    /// # Errors
    ///
    /// Fails on engine rejection.
    async fn create_volume(&self, name: &str) -> Result<()>;

    /// Force-removes a named volume.
    ///
    /// # Errors
    ///
    /// Fails if the volume does not exist or is still in use.
    async fn remove_volume(&self, name: &str) -> Result<()>;

    /// Creates a network and returns its engine-assigned identifier.
    ///
    /// # Errors
    ///
    /// Fails on engine rejection.
    async fn create_network(&self, name: &str) -> Result<NetworkId>;

    /// Removes a network.
    ///
    /// # Errors
    ///
    /// Fails if the network does not exist or has attached containers.
    async fn remove_network(&self, id: &NetworkId) -> Result<()>;
}
