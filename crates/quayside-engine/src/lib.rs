//! # quayside-engine
//!
//! The boundary between the lifecycle harness and a container engine.
//!
//! [`ContainerEngine`] is the swappable adapter trait; [`DockerEngine`]
//! implements it against the Docker Engine HTTP API over a local socket.
//! The crate also carries the pieces that sit directly on that boundary:
//! the multiplexed stdout/stderr decoder ([`demux`]), the in-memory tar
//! build-context builder ([`archive`]), and an in-memory [`fake`] engine
//! for tests that must not depend on a running daemon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod archive;
pub mod client;
pub mod demux;
pub mod docker;
pub mod fake;
pub mod spec;
pub mod wire;

pub use client::{ContainerEngine, ContainerStatus, ExecResult};
pub use docker::{DockerEngine, Endpoint};
pub use fake::FakeEngine;
pub use spec::ContainerSpec;
