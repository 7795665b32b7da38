//! Built-in plugin modules. Each exposes an `entry_table()` registered
//! under its plugin id by `ModuleRegistry::builtin`; a plugin directory
//! with a manifest selects which entries a workflow may call.

pub mod dynamics;
pub mod system;
pub mod tree;
