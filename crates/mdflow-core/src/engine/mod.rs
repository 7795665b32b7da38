//! Campaign orchestration: plugins, the kernel, the simulation driver, and
//! the run context threaded through every entry invocation.
//!
//! The layering is strict: `core` knows nothing about execution, this
//! module owns all of it, and `analysis` is driven from here per block or
//! off-line through the trajectory watcher.

pub mod args;
pub mod context;
pub mod driver;
pub mod engines;
pub mod error;
pub mod kernel;
pub mod plugin;
pub mod progress;
pub mod registry;
pub mod session;
