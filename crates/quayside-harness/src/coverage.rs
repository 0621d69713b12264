//! Coverage artifact handling.
//!
//! An instrumented workload shortcuts its normal exit path when flushing
//! coverage data, because a non-zero process exit would suppress the
//! write-out. It records the real exit code in a file instead, and the
//! harness reads that file back after waiting on the container. The
//! artifact is consumed at most once per lifecycle: it is deleted as soon
//! as it has been read, whether or not it parses, so a stale value can
//! never leak into the next test.

use std::fs;
use std::path::Path;

use quayside_common::constants::{COVERAGE_EXIT_FILE, RAW_COVERAGE_FILE};
use quayside_common::error::{QuaysideError, Result};

/// Applies the exit-code artifact over the engine-reported code.
///
/// Returns the artifact's value when one exists and parses; otherwise the
/// engine code is kept and the failure is logged, not raised.
#[must_use]
pub fn override_exit_code(coverage_dir: &Path, engine_code: i64) -> i64 {
    let path = coverage_dir.join(COVERAGE_EXIT_FILE);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) => {
            tracing::debug!(
                path = %path.display(),
                error = %error,
                "no exit-code artifact, keeping engine exit code"
            );
            return engine_code;
        }
    };
    if let Err(error) = fs::remove_file(&path) {
        tracing::warn!(
            path = %path.display(),
            error = %error,
            "failed to delete exit-code artifact"
        );
    }
    match contents.trim().parse::<i64>() {
        Ok(code) => {
            tracing::info!(code, "exit code taken from coverage artifact");
            code
        }
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "malformed exit-code artifact, keeping engine exit code"
            );
            engine_code
        }
    }
}

/// Claims the raw coverage profile for a lifecycle.
///
/// The workload writes its profile under a fixed name; renaming it after
/// the lifecycle keeps profiles from successive tests apart. Absence of a
/// profile is not an error: uninstrumented workloads never write one.
///
/// # Errors
///
/// Returns [`QuaysideError::Io`] if the rename itself fails.
pub fn claim_profile(coverage_dir: &Path, lifecycle: &str) -> Result<()> {
    let source = coverage_dir.join(RAW_COVERAGE_FILE);
    if !source.exists() {
        return Ok(());
    }
    let target = coverage_dir.join(format!("{lifecycle}.cov"));
    fs::rename(&source, &target).map_err(|e| QuaysideError::Io {
        path: source.clone(),
        source: e,
    })?;
    tracing::debug!(target = %target.display(), "coverage profile claimed");
    Ok(())
}
