//! # MDFLOW Core Library
//!
//! A plugin-driven orchestrator for molecular-dynamics campaigns: directory
//! scaffolding, configuration generation, stepped simulation of an external
//! dynamics engine, and per-frame defect analysis, all wired together by a
//! YAML workflow document.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict layering to separate data from orchestration:
//!
//! - **[`core`]: The Foundation.** Stateless data: the workflow state tree
//!   (`state`), particle snapshots and periodic-cell geometry, and the
//!   trajectory file formats (`io`).
//!
//! - **[`engine`]: The Logic Core.** The stateful layer: argument bundles,
//!   plugin loading against the module registry, the kernel executing a
//!   workflow sequence, the dynamics-session abstraction, and the
//!   block-averaging simulation driver with its pipelined variant.
//!
//! - **[`analysis`]: The Observables.** Wigner-Seitz site occupancy against
//!   a reference lattice, vacancy clustering, accumulated series with CSV
//!   tables and PNG plots, and a polling trajectory watcher for off-line
//!   runs.
//!
//! - **[`plugins`] and [`workflows`]: The Public Surface.** The built-in
//!   plugin modules (`tree`, `system`, `dynamics`) and the campaign entry
//!   points used by the CLI.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod plugins;
pub mod workflows;
