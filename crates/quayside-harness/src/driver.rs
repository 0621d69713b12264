//! The lifecycle driver.
//!
//! One [`Harness`] drives one container lifecycle end to end, from create
//! and start through probing and waiting to stop and remove. Setup failures
//! propagate immediately; teardown failures are logged and swallowed so they
//! never mask the failure that actually ended the lifecycle. Distinct
//! harnesses share nothing and may run concurrently against the same engine.

use std::future::Future;
use std::time::Duration;

use quayside_common::constants::{COVERAGE_FILE_ENV, COVERAGE_MOUNT};
use quayside_common::error::{QuaysideError, Result};
use quayside_common::types::{ContainerId, NetworkId};
use quayside_engine::{ContainerEngine, ContainerSpec, archive, demux};

use crate::config::HarnessConfig;
use crate::coverage;

/// Drives one container lifecycle against an injected engine client.
pub struct Harness<'e> {
    pub(crate) engine: &'e dyn ContainerEngine,
    pub(crate) config: HarnessConfig,
}

impl<'e> Harness<'e> {
    /// Binds a configuration to an engine client.
    #[must_use]
    pub const fn new(engine: &'e dyn ContainerEngine, config: HarnessConfig) -> Self {
        Self { engine, config }
    }

    /// Returns the lifecycle configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Creates a container from the specification without starting it.
    ///
    /// Harness defaults are applied first: the configured image when the
    /// specification leaves it empty, and the coverage environment and bind
    /// mount when coverage mode is on.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the image is missing or the specification
    /// is rejected.
    pub async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let prepared = self.prepare(spec);
        self.engine
            .create_container(&self.config.name, &prepared)
            .await
    }

    /// Starts a created or stopped container.
    ///
    /// # Errors
    ///
    /// Returns an engine error on rejection (for example a port conflict).
    /// The caller remains responsible for eventual removal.
    pub async fn start(&self, id: &ContainerId) -> Result<()> {
        self.engine.start_container(id).await
    }

    /// Creates and starts a container in one step.
    ///
    /// A start failure still tears the fresh container down before the
    /// error is returned, so the caller never owns a half-started handle.
    ///
    /// # Errors
    ///
    /// Returns the create or start failure.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<ContainerId> {
        let id = self.create(spec).await?;
        if let Err(error) = self.start(&id).await {
            tracing::warn!(id = %id, error = %error, "start failed, tearing down fresh container");
            self.clean(&id).await;
            return Err(error);
        }
        tracing::info!(id = %id, name = %self.config.name, "container running");
        Ok(id)
    }

    /// Blocks until the container's main process exits, bounded by `timeout`.
    ///
    /// In coverage mode the exit-code artifact, when present, replaces the
    /// engine-reported code and is consumed; an absent or malformed artifact
    /// keeps the engine code and is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`QuaysideError::Timeout`] when the deadline elapses, or an
    /// engine error from the wait itself. Abandoning the wait leaves the
    /// container untouched.
    pub async fn wait_for_exit(&self, id: &ContainerId, timeout: Duration) -> Result<i64> {
        let code = tokio::time::timeout(timeout, self.engine.wait_container(id))
            .await
            .map_err(|_| QuaysideError::Timeout {
                operation: "wait for exit".into(),
                seconds: timeout.as_secs(),
            })??;
        Ok(match &self.config.coverage {
            Some(settings) => coverage::override_exit_code(&settings.host_dir, code),
            None => code,
        })
    }

    /// Requests a graceful stop with the configured grace period.
    ///
    /// The grace period gives an instrumented workload time to flush its
    /// coverage profile before the engine kills the process.
    ///
    /// # Errors
    ///
    /// Returns an engine error; stopping an already-stopped container is
    /// not one.
    pub async fn stop(&self, id: &ContainerId) -> Result<()> {
        self.engine.stop_container(id, self.config.stop_grace).await
    }

    /// Force-removes the container and its anonymous volumes.
    ///
    /// # Errors
    ///
    /// Returns an engine error, including not-found for a container that is
    /// already gone; [`Harness::clean`] tolerates that case.
    pub async fn remove(&self, id: &ContainerId) -> Result<()> {
        self.engine.remove_container(id).await
    }

    /// Runs a command in the container and returns its real exit code.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the exec cannot be created or started;
    /// probe commands returning non-zero are values, not errors.
    pub async fn exec_with_exit_code(
        &self,
        id: &ContainerId,
        user: &str,
        cmd: &[&str],
    ) -> Result<i64> {
        let argv: Vec<String> = cmd.iter().map(ToString::to_string).collect();
        let exec = self.engine.create_exec(id, user, &argv).await?;
        // The attach stream reports exit code 0 no matter what the command
        // returned; drain it purely as the completion signal and read the
        // real code from exec inspection. Callers needing both the code and
        // the output must issue two separate execs.
        let _streamed = self.engine.start_exec(&exec).await?;
        self.engine.inspect_exec(&exec).await
    }

    /// Runs a command in the container and returns its combined output.
    ///
    /// The output is trustworthy; the exit code on this path is not. Use
    /// [`Harness::exec_with_exit_code`] in a second exec when the code
    /// matters.
    ///
    /// # Errors
    ///
    /// Returns an engine error from the exec calls or a decode error for a
    /// malformed output stream.
    pub async fn exec_with_output(
        &self,
        id: &ContainerId,
        user: &str,
        cmd: &[&str],
    ) -> Result<String> {
        let argv: Vec<String> = cmd.iter().map(ToString::to_string).collect();
        let exec = self.engine.create_exec(id, user, &argv).await?;
        let raw = self.engine.start_exec(&exec).await?;
        demux::decode(&raw)
    }

    /// Fetches and decodes the container's log stream.
    ///
    /// # Errors
    ///
    /// Returns [`QuaysideError::Timeout`] when the configured log deadline
    /// elapses, an engine error from the stream call, or a decode error for
    /// a malformed stream.
    pub async fn logs(&self, id: &ContainerId) -> Result<String> {
        let deadline = self.config.logs_deadline;
        let raw = tokio::time::timeout(deadline, self.engine.container_logs(id))
            .await
            .map_err(|_| QuaysideError::Timeout {
                operation: "stream logs".into(),
                seconds: deadline.as_secs(),
            })??;
        demux::decode(&raw)
    }

    /// Best-effort teardown, safe on every exit path.
    ///
    /// Inspects and logs the container's state, stops it, claims the
    /// coverage profile when coverage is on, dumps the container logs, and
    /// force-removes. Every failure in here is logged at warn level and
    /// swallowed; a container that is already gone ends the teardown early.
    pub async fn clean(&self, id: &ContainerId) {
        match self.engine.inspect_container(id).await {
            Ok(status) => {
                tracing::info!(id = %id, status = %status.status, "tearing down container");
            }
            Err(QuaysideError::NotFound { .. }) => {
                tracing::debug!(id = %id, "container already gone at teardown");
                return;
            }
            Err(error) => {
                tracing::warn!(id = %id, error = %error, "state inspection failed during teardown");
            }
        }
        if let Err(error) = self.stop(id).await {
            tracing::warn!(id = %id, error = %error, "stop failed during teardown");
        }
        if let Some(settings) = &self.config.coverage {
            let claimed = coverage::claim_profile(&settings.host_dir, &self.config.name);
            if let Err(error) = claimed {
                tracing::warn!(error = %error, "coverage profile claim failed during teardown");
            }
        }
        match self.logs(id).await {
            Ok(text) if !text.is_empty() => {
                tracing::debug!(id = %id, logs = %text, "container logs at teardown");
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(id = %id, error = %error, "log retrieval failed during teardown");
            }
        }
        if let Err(error) = self.remove(id).await {
            tracing::warn!(id = %id, error = %error, "remove failed during teardown");
        }
    }

    /// Runs a container with an overridden entrypoint, waits for it to
    /// exit, and returns its exit code and logs. Teardown is guaranteed.
    ///
    /// # Errors
    ///
    /// Returns the run failure, a timeout if the container outlives the
    /// configured one-shot deadline, or an engine error from the wait.
    pub async fn run_one_shot(&self, cmd: &[&str]) -> Result<(i64, String)> {
        let spec = ContainerSpec::new("").with_entrypoint(cmd);
        let id = self.run(&spec).await?;
        let waited = self.wait_for_exit(&id, self.config.one_shot_wait).await;
        let logs = self.logs(&id).await.unwrap_or_default();
        self.clean(&id).await;
        Ok((waited?, logs))
    }

    /// Runs `f` against a fresh container, then tears the container down
    /// regardless of the closure's outcome.
    ///
    /// # Errors
    ///
    /// Returns the run failure or the closure's error.
    pub async fn with_container<T, F, Fut>(&self, spec: &ContainerSpec, f: F) -> Result<T>
    where
        F: FnOnce(ContainerId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = self.run(spec).await?;
        let result = f(id.clone()).await;
        self.clean(&id).await;
        result
    }

    /// Runs `f` with a named volume in place, then force-removes the
    /// volume regardless of the closure's outcome.
    ///
    /// # Errors
    ///
    /// Returns the creation failure or the closure's error; removal
    /// failures are logged and swallowed.
    pub async fn with_volume<T, F, Fut>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.engine.create_volume(name).await?;
        let result = f().await;
        if let Err(error) = self.engine.remove_volume(name).await {
            tracing::warn!(name, error = %error, "volume removal failed during teardown");
        }
        result
    }

    /// Runs `f` with a fresh network in place, then removes the network
    /// regardless of the closure's outcome.
    ///
    /// # Errors
    ///
    /// Returns the creation failure or the closure's error; removal
    /// failures are logged and swallowed.
    pub async fn with_network<T, F, Fut>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(NetworkId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let network = self.engine.create_network(name).await?;
        let result = f(network.clone()).await;
        if let Err(error) = self.engine.remove_network(&network).await {
            tracing::warn!(name, error = %error, "network removal failed during teardown");
        }
        result
    }

    /// Builds an ad-hoc image, runs `f`, then force-removes the image
    /// regardless of the closure's outcome.
    ///
    /// # Errors
    ///
    /// Returns the build failure or the closure's error; removal failures
    /// are logged and swallowed.
    pub async fn with_image<T, F, Fut>(
        &self,
        files: &[(&str, &[u8])],
        tag: &str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.build_image(files, tag).await?;
        let result = f().await;
        if let Err(error) = self.engine.remove_image(tag).await {
            tracing::warn!(tag, error = %error, "image removal failed during teardown");
        }
        result
    }

    /// Builds an image from an in-memory file set.
    ///
    /// # Errors
    ///
    /// Returns an archive error, an engine error, or the first error
    /// message carried by the engine's build progress stream.
    pub async fn build_image(&self, files: &[(&str, &[u8])], tag: &str) -> Result<()> {
        let context = archive::build_context(files)?;
        self.engine.build_image(context, tag).await
    }

    /// Force-removes a built image.
    ///
    /// # Errors
    ///
    /// Returns an engine error, including not-found for an unknown tag.
    pub async fn remove_image(&self, tag: &str) -> Result<()> {
        self.engine.remove_image(tag).await
    }

    /// Applies harness defaults to a caller specification.
    fn prepare(&self, spec: &ContainerSpec) -> ContainerSpec {
        let mut prepared = spec.clone();
        if prepared.image.is_empty() {
            prepared.image = self.config.image.clone();
        }
        if let Some(settings) = &self.config.coverage {
            prepared
                .env
                .push(format!("{COVERAGE_FILE_ENV}={}.cov", self.config.name));
            prepared.binds.push(format!(
                "{}:{COVERAGE_MOUNT}",
                settings.host_dir.display()
            ));
        }
        prepared
    }
}
