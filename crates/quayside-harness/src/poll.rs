//! Readiness and health probing.
//!
//! Readiness is defined purely as "the workload's own check command
//! succeeds"; the harness knows nothing about the queue manager's startup
//! sequence. The poller has two states, waiting and ready, and no failed
//! state: only the caller's own deadline ends an unready wait.

use quayside_common::constants::{HEALTHY_PROBE, LIST_QUEUE_MANAGERS, MQ_ADMIN_USER, READY_PROBE};
use quayside_common::error::Result;
use quayside_common::types::ContainerId;

use crate::driver::Harness;

impl Harness<'_> {
    /// Polls the readiness probe until it succeeds.
    ///
    /// Every non-zero probe exit is routine, never an error; attempts are
    /// unbounded and spaced by the configured poll interval. Callers wrap
    /// this in their own deadline for non-interactive use; cancelling the
    /// future leaves the container untouched.
    ///
    /// # Errors
    ///
    /// Returns an engine error only if a probe exec cannot be issued at
    /// all (for example against a container that is no longer running).
    pub async fn wait_for_ready(&self, id: &ContainerId) -> Result<()> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let code = self
                .exec_with_exit_code(id, MQ_ADMIN_USER, &[READY_PROBE])
                .await?;
            if code == 0 {
                tracing::info!(id = %id, attempt, "workload ready");
                return Ok(());
            }
            tracing::debug!(id = %id, attempt, code, "workload not ready yet");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Runs the health probe once and reports its verdict.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the probe exec cannot be issued.
    pub async fn check_healthy(&self, id: &ContainerId) -> Result<bool> {
        let code = self
            .exec_with_exit_code(id, MQ_ADMIN_USER, &[HEALTHY_PROBE])
            .await?;
        Ok(code == 0)
    }

    /// Returns the server's queue-manager listing output.
    ///
    /// # Errors
    ///
    /// Returns an engine or decode error from the listing exec.
    pub async fn list_queue_managers(&self, id: &ContainerId) -> Result<String> {
        self.exec_with_output(id, MQ_ADMIN_USER, &[LIST_QUEUE_MANAGERS])
            .await
    }

    /// Whether the server reports a queue manager with the given name.
    ///
    /// # Errors
    ///
    /// Returns an engine or decode error from the listing exec.
    pub async fn has_queue_manager(&self, id: &ContainerId, name: &str) -> Result<bool> {
        let listing = self.list_queue_managers(id).await?;
        Ok(listing.contains(&queue_manager_token(name)))
    }
}

/// The token the listing command prints for a named queue manager.
#[must_use]
pub fn queue_manager_token(name: &str) -> String {
    format!("QMNAME({name})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use quayside_engine::{ContainerSpec, FakeEngine};

    use crate::config::HarnessConfig;

    fn fast_harness<'e>(engine: &'e FakeEngine, name: &str) -> Harness<'e> {
        Harness::new(
            engine,
            HarnessConfig::new(name).with_poll_interval(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn poller_invokes_the_probe_exactly_n_times() {
        let engine = FakeEngine::new();
        for _ in 0..3 {
            engine.script_exec(READY_PROBE, 1, "");
        }
        engine.script_exec(READY_PROBE, 0, "");
        let harness = fast_harness(&engine, "slow-start");

        let id = harness.run(&ContainerSpec::new("")).await.expect("run");
        harness.wait_for_ready(&id).await.expect("ready");
        assert_eq!(engine.exec_count(READY_PROBE), 4);

        harness.clean(&id).await;
    }

    #[tokio::test]
    async fn readiness_is_reached_again_after_stop_and_start() {
        let engine = FakeEngine::new();
        let harness = fast_harness(&engine, "restarted");

        let id = harness.run(&ContainerSpec::new("")).await.expect("run");
        harness.wait_for_ready(&id).await.expect("first ready");

        harness.stop(&id).await.expect("stop");
        harness.start(&id).await.expect("start");
        engine.script_exec(READY_PROBE, 1, "");
        harness.wait_for_ready(&id).await.expect("second ready");

        assert_eq!(engine.exec_count(READY_PROBE), 3);
        assert!(engine.is_running("restarted"));
        harness.clean(&id).await;
        assert_eq!(engine.container_count(), 0);
    }

    #[tokio::test]
    async fn probing_a_stopped_container_is_an_error_not_a_retry() {
        let engine = FakeEngine::new();
        let harness = fast_harness(&engine, "stopped");

        let id = harness.run(&ContainerSpec::new("")).await.expect("run");
        harness.stop(&id).await.expect("stop");
        assert!(harness.wait_for_ready(&id).await.is_err());

        harness.clean(&id).await;
    }

    #[tokio::test]
    async fn health_probe_verdict_follows_the_exit_code() {
        let engine = FakeEngine::new();
        engine.script_exec(HEALTHY_PROBE, 2, "");
        let harness = fast_harness(&engine, "health");

        let id = harness.run(&ContainerSpec::new("")).await.expect("run");
        assert!(!harness.check_healthy(&id).await.expect("first probe"));
        assert!(harness.check_healthy(&id).await.expect("second probe"));

        harness.clean(&id).await;
    }

    #[tokio::test]
    async fn queue_manager_listing_is_matched_by_token() {
        let engine = FakeEngine::new();
        engine.script_exec(
            LIST_QUEUE_MANAGERS,
            0,
            "QMNAME(qm1)                                               STATUS(Running)",
        );
        let harness = fast_harness(&engine, "listing");

        let id = harness.run(&ContainerSpec::new("")).await.expect("run");
        assert!(
            harness
                .has_queue_manager(&id, "qm1")
                .await
                .expect("first listing")
        );
        assert!(
            !harness
                .has_queue_manager(&id, "qm2")
                .await
                .expect("second listing")
        );

        harness.clean(&id).await;
    }
}
