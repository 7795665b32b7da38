//! # Core Module
//!
//! Stateless foundations of the campaign orchestrator: the workflow state
//! tree with path-qualified key access, particle+cell snapshots, periodic
//! cell geometry, and trajectory file I/O. Nothing in this layer knows
//! about plugins, kernels or simulation sessions.

pub mod geometry;
pub mod io;
pub mod snapshot;
pub mod state;
