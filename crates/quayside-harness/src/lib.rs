//! # quayside-harness
//!
//! The container lifecycle driver for queue-manager test orchestration.
//!
//! A [`Harness`] binds one lifecycle (a name, an image, timeouts, optional
//! coverage wiring) to an injected [`ContainerEngine`] and drives the full
//! create, start, probe, wait, stop, remove sequence, guaranteeing teardown
//! on every exit path. The queue manager itself is a black box: the harness
//! only ever sees exit codes, exec output, and log text.
//!
//! [`ContainerEngine`]: quayside_engine::ContainerEngine

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod coverage;
pub mod driver;
pub mod poll;

pub use config::{CoverageSettings, HarnessConfig};
pub use driver::Harness;
