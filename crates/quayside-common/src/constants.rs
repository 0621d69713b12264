//! Workload contract constants shared by the harness and the volume tools.
//!
//! The queue-manager image is a black box; everything the harness knows about
//! it is the set of names and numbers below.

/// Readiness probe command run inside the workload container.
pub const READY_PROBE: &str = "chkmqready";

/// Health probe command run inside the workload container.
pub const HEALTHY_PROBE: &str = "chkmqhealthy";

/// Queue-manager listing command; its output contains `QMNAME(<name>)`
/// entries for every queue manager the server knows about.
pub const LIST_QUEUE_MANAGERS: &str = "dspmq";

/// Administrative user the probe commands run as.
pub const MQ_ADMIN_USER: &str = "mqm";

/// Numeric uid that must own the queue-manager data directory.
pub const MQ_UID: u32 = 999;

/// Numeric gid that must own the queue-manager data directory.
pub const MQ_GID: u32 = 999;

/// Subdirectory created under the mounted volume for queue-manager data.
pub const DATA_SUBDIR: &str = "data";

/// Container-side mount point of the queue-manager data volume.
pub const VOLUME_MOUNT: &str = "/mnt/mqm";

/// Container-side mount point of the coverage directory.
pub const COVERAGE_MOUNT: &str = "/var/coverage";

/// File inside the coverage directory carrying the workload's real exit code.
pub const COVERAGE_EXIT_FILE: &str = "exitCode";

/// Environment variable telling the workload where to write its profile.
pub const COVERAGE_FILE_ENV: &str = "COVERAGE_FILE";

/// Name the workload writes its profile under before the harness claims it
/// for a specific lifecycle.
pub const RAW_COVERAGE_FILE: &str = "container.cov";

/// Environment variable overriding the default workload image.
pub const IMAGE_ENV: &str = "QUAYSIDE_IMAGE";

/// Environment variable enabling coverage mode (`"1"` or `"true"`).
pub const COVERAGE_ENV: &str = "QUAYSIDE_COVERAGE";

/// Workload image used when the environment provides none.
pub const DEFAULT_IMAGE: &str = "qm-devserver:latest";
