//! # quayside-common
//!
//! Shared error type, identifier newtypes, and workload contract constants
//! used across the Quayside workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives everything else builds upon.

pub mod constants;
pub mod error;
pub mod types;
