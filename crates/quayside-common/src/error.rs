//! Unified error types for the Quayside workspace.
//!
//! The variants map one-to-one onto the failure classes of the harness:
//! engine rejections, malformed streams, filesystem problems, and expired
//! deadlines. Probe commands returning non-zero are *not* errors; they are
//! ordinary exit-code values the poller interprets.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum QuaysideError {
    /// The container engine rejected or failed an API operation.
    #[error("engine error during {operation}: {message}")]
    Engine {
        /// API operation that failed (e.g. `"create container"`).
        operation: String,
        /// Engine-reported failure message.
        message: String,
    },

    /// A required engine resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A multiplexed stream or wire payload could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the malformed input.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A blocking operation did not finish within its deadline.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        /// Operation that exceeded its deadline.
        operation: String,
        /// Deadline that elapsed, in seconds.
        seconds: u64,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, QuaysideError>;
