//! Per-lifecycle harness configuration.

use std::path::PathBuf;
use std::time::Duration;

use quayside_common::constants::{COVERAGE_ENV, DEFAULT_IMAGE, IMAGE_ENV};
use quayside_common::error::{QuaysideError, Result};

/// Minimum delay between readiness probe attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Grace period granted to a container on stop before the engine kills it.
/// Long enough for the workload to flush an in-flight coverage profile.
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Deadline on fetching a container's log stream.
const DEFAULT_LOGS_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline on waiting for a one-shot container to exit.
const DEFAULT_ONE_SHOT_WAIT: Duration = Duration::from_secs(10);

/// Host-side directory bind-mounted into containers for coverage artifacts,
/// relative to the working directory.
const COVERAGE_SUBDIR: &str = "coverage";

/// Coverage wiring for one lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSettings {
    /// Host directory bind-mounted at the container's coverage mount point.
    pub host_dir: PathBuf,
}

/// Everything one lifecycle needs besides an engine client.
///
/// The name doubles as the container name and the stem of the lifecycle's
/// coverage profile, so concurrent lifecycles must use distinct names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Lifecycle name; used as the container name.
    pub name: String,
    /// Image applied to specifications that leave the image empty.
    pub image: String,
    /// Coverage wiring; `None` disables exit-code correction and profile
    /// collection.
    pub coverage: Option<CoverageSettings>,
    /// Minimum delay between readiness probe attempts.
    pub poll_interval: Duration,
    /// Grace period passed to the engine on stop.
    pub stop_grace: Duration,
    /// Deadline on log retrieval.
    pub logs_deadline: Duration,
    /// Deadline on one-shot container runs.
    pub one_shot_wait: Duration,
}

impl HarnessConfig {
    /// Creates a configuration with defaults and no coverage wiring.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: DEFAULT_IMAGE.to_string(),
            coverage: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_grace: DEFAULT_STOP_GRACE,
            logs_deadline: DEFAULT_LOGS_DEADLINE,
            one_shot_wait: DEFAULT_ONE_SHOT_WAIT,
        }
    }

    /// Creates a configuration from the environment.
    ///
    /// `QUAYSIDE_IMAGE` overrides the default image; `QUAYSIDE_COVERAGE`
    /// (`1` or `true`) enables coverage mode with artifacts collected under
    /// `<working dir>/coverage`.
    ///
    /// # Errors
    ///
    /// Returns [`QuaysideError::Io`] if coverage mode is enabled and the
    /// working directory cannot be determined.
    pub fn from_env(name: impl Into<String>) -> Result<Self> {
        let mut config = Self::new(name);
        let image = std::env::var(IMAGE_ENV).unwrap_or_default();
        if !image.is_empty() {
            config.image = image;
        }
        let coverage = std::env::var(COVERAGE_ENV).unwrap_or_default();
        if matches!(coverage.as_str(), "1" | "true") {
            let cwd = std::env::current_dir().map_err(|e| QuaysideError::Io {
                path: PathBuf::from("."),
                source: e,
            })?;
            config.coverage = Some(CoverageSettings {
                host_dir: cwd.join(COVERAGE_SUBDIR),
            });
        }
        Ok(config)
    }

    /// Sets the default image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Enables coverage mode with the given host directory.
    #[must_use]
    pub fn with_coverage(mut self, host_dir: impl Into<PathBuf>) -> Self {
        self.coverage = Some(CoverageSettings {
            host_dir: host_dir.into(),
        });
        self
    }

    /// Sets the minimum delay between readiness probe attempts.
    ///
    /// Tests drive this to zero to keep polling fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the deadline on one-shot container runs.
    #[must_use]
    pub const fn with_one_shot_wait(mut self, wait: Duration) -> Self {
        self.one_shot_wait = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_workload_contract() {
        let config = HarnessConfig::new("lifecycle-a");
        assert_eq!(config.name, "lifecycle-a");
        assert_eq!(config.image, DEFAULT_IMAGE);
        assert!(config.coverage.is_none());
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.stop_grace, Duration::from_secs(10));
    }

    #[test]
    fn builders_override_individual_fields() {
        let config = HarnessConfig::new("lifecycle-b")
            .with_image("qm-custom:2")
            .with_coverage("/tmp/cov")
            .with_poll_interval(Duration::ZERO);
        assert_eq!(config.image, "qm-custom:2");
        assert_eq!(
            config.coverage,
            Some(CoverageSettings {
                host_dir: PathBuf::from("/tmp/cov")
            })
        );
        assert_eq!(config.poll_interval, Duration::ZERO);
    }
}
