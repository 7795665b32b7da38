use super::args::ArgBundle;
use super::context::RunContext;
use super::error::EngineError;
use std::collections::HashMap;
use std::sync::Arc;

/// One registered entry-point callable.
pub type EntryFn =
    Arc<dyn Fn(&mut RunContext, &ArgBundle) -> Result<(), EngineError> + Send + Sync>;

/// The executable side of one plugin: a table mapping entry-point names to
/// callables. Tables are registered per plugin id, so two plugins may each
/// expose same-named entries without collision.
#[derive(Default, Clone)]
pub struct EntryTable {
    entries: HashMap<String, EntryFn>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: &str, entry: F) -> Self
    where
        F: Fn(&mut RunContext, &ArgBundle) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.entries.insert(name.to_string(), Arc::new(entry));
        self
    }

    pub fn get(&self, name: &str) -> Option<&EntryFn> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Registry of plugin modules, keyed by plugin id. Manifest validation is a
/// static check against this table at plugin-load time; nothing is resolved
/// reflectively at run time.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, EntryTable>,
}

impl ModuleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry with every built-in module: `tree`, `system`, `dynamics`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("tree", crate::plugins::tree::entry_table());
        registry.register("system", crate::plugins::system::entry_table());
        registry.register("dynamics", crate::plugins::dynamics::entry_table());
        registry
    }

    pub fn register(&mut self, plugin_id: &str, table: EntryTable) {
        self.modules.insert(plugin_id.to_string(), table);
    }

    pub fn get(&self, plugin_id: &str) -> Option<&EntryTable> {
        self.modules.get(plugin_id)
    }
}
