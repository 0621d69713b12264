//! End-to-end lifecycles against a real Docker daemon.
//!
//! These exercise the full stack (driver, poller, demultiplexer, and the
//! Docker Engine adapter) and need a daemon plus a queue-manager developer
//! image (`QUAYSIDE_IMAGE` to override the default tag):
//!
//! ```text
//! cargo test -p quayside-harness --test docker_e2e -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use quayside_common::constants::{MQ_ADMIN_USER, VOLUME_MOUNT};
use quayside_engine::{ContainerSpec, DockerEngine};
use quayside_harness::{Harness, HarnessConfig};

/// Generous outer deadline for a queue manager to come up from scratch.
const READY_DEADLINE: Duration = Duration::from_secs(90);

/// Deadline for workloads expected to exit immediately.
const EXIT_DEADLINE: Duration = Duration::from_secs(5);

fn engine() -> DockerEngine {
    DockerEngine::from_env().expect("engine endpoint")
}

fn config(name: &str) -> HarnessConfig {
    HarnessConfig::from_env(name).expect("harness config")
}

/// Developer-image specification that accepts the license and names the
/// default queue manager.
fn devserver_spec() -> ContainerSpec {
    ContainerSpec::new("")
        .with_env("LICENSE=accept")
        .with_env("MQ_QMGR_NAME=qm1")
}

// ---------------------------------------------------------------------------
// Golden path
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn golden_path_reaches_ready_and_reports_the_queue_manager() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-golden-path"));
    let h = &harness;

    harness
        .with_container(&devserver_spec(), |id| async move {
            tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                .await
                .expect("readiness deadline")
                .expect("readiness probe");

            assert!(h.check_healthy(&id).await.expect("health probe"));
            assert!(
                h.has_queue_manager(&id, "qm1")
                    .await
                    .expect("queue manager listing")
            );

            let logs = h.logs(&id).await.expect("logs");
            assert!(!logs.is_empty());
            Ok(())
        })
        .await
        .expect("lifecycle");
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn missing_license_acceptance_exits_with_code_one() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-no-license"));
    let h = &harness;

    harness
        .with_container(&ContainerSpec::new(""), |id| async move {
            let code = h.wait_for_exit(&id, EXIT_DEADLINE).await?;
            assert_eq!(code, 1);
            Ok(())
        })
        .await
        .expect("lifecycle");
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn one_shot_command_reports_its_exit_code_and_output() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-one-shot"));

    let (code, logs) = harness
        .run_one_shot(&["bash", "-c", "echo bootstrap check; exit 7"])
        .await
        .expect("one shot");
    assert_eq!(code, 7);
    assert!(logs.contains("bootstrap check"));
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn restart_reaches_ready_again_without_recreation() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-restart"));
    let h = &harness;

    harness
        .with_container(&devserver_spec(), |id| async move {
            tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                .await
                .expect("first readiness deadline")
                .expect("first readiness");

            h.stop(&id).await.expect("stop");
            h.start(&id).await.expect("start");

            tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                .await
                .expect("second readiness deadline")
                .expect("second readiness");
            Ok(())
        })
        .await
        .expect("lifecycle");
}

// ---------------------------------------------------------------------------
// Volumes
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn named_volume_carries_data_across_container_lifecycles() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-volume"));
    let h = &harness;

    harness
        .with_volume("e2e-qm-data", || async move {
            let spec = devserver_spec().with_bind(format!("e2e-qm-data:{VOLUME_MOUNT}"));

            h.with_container(&spec, |id| async move {
                tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                    .await
                    .expect("first readiness deadline")
                    .expect("first readiness");
                Ok(())
            })
            .await?;

            // The second container adopts the queue manager the first one
            // created on the shared volume.
            h.with_container(&spec, |id| async move {
                tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                    .await
                    .expect("second readiness deadline")
                    .expect("second readiness");
                assert!(
                    h.has_queue_manager(&id, "qm1")
                        .await
                        .expect("queue manager listing")
                );
                Ok(())
            })
            .await
        })
        .await
        .expect("volume lifecycle");
}

// ---------------------------------------------------------------------------
// Ad-hoc image builds
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn layered_image_applies_mqsc_configuration() {
    let engine = engine();
    let harness = Harness::new(&engine, config("e2e-mqsc"));
    let h = &harness;

    let dockerfile = format!(
        "FROM {}\nADD 20-config.mqsc /etc/mqm/\n",
        harness.config().image
    );
    let files = [
        ("Dockerfile", dockerfile.as_bytes()),
        ("20-config.mqsc", b"DEFINE QLOCAL(E2E.TEST.QUEUE)\n".as_slice()),
    ];

    harness
        .with_image(&files, "qm-devserver:e2e-mqsc", || async move {
            let spec = ContainerSpec::new("qm-devserver:e2e-mqsc")
                .with_env("LICENSE=accept")
                .with_env("MQ_QMGR_NAME=qm1");

            h.with_container(&spec, |id| async move {
                tokio::time::timeout(READY_DEADLINE, h.wait_for_ready(&id))
                    .await
                    .expect("readiness deadline")
                    .expect("readiness probe");

                let queues = h
                    .exec_with_output(
                        &id,
                        MQ_ADMIN_USER,
                        &["bash", "-c", "echo 'DISPLAY QLOCAL(E2E.TEST.QUEUE)' | runmqsc qm1"],
                    )
                    .await
                    .expect("queue display");
                assert!(queues.contains("E2E.TEST.QUEUE"));
                Ok(())
            })
            .await
        })
        .await
        .expect("image lifecycle");
}
