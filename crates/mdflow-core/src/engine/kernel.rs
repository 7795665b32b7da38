use super::args::ArgBundle;
use super::context::RunContext;
use super::error::EngineError;
use super::plugin::Plugin;
use super::progress::Progress;
use super::registry::ModuleRegistry;
use crate::core::state::WorkflowState;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// One validated workflow command: a plugin entry point plus its argument
/// bundle, taken verbatim from the document.
#[derive(Debug, Clone)]
pub struct Command {
    pub plugin: String,
    pub entry: String,
    pub args: Value,
}

/// The campaign kernel: loads plugins declared by a workflow document and
/// executes its `sequence` strictly in document order, single threaded.
/// There is no retry, branching, or skip here; a failing command aborts the
/// run unless its own bundle opted into `strict: false`.
#[derive(Debug)]
pub struct Kernel {
    state: WorkflowState,
    plugin_root: PathBuf,
    plugins: HashMap<String, Plugin>,
    commands: Vec<Command>,
}

impl Kernel {
    /// Builds a kernel from a workflow document on disk. Plugin directories
    /// are resolved as `<plugin_root>/<plugin id>`.
    pub fn new<P: AsRef<Path>>(workflow: P, plugin_root: P) -> Result<Self, EngineError> {
        let state = WorkflowState::load(workflow)?;
        Self::from_state(state, plugin_root.as_ref())
    }

    /// Builds a kernel from a pre-loaded state tree. The `sequence` section
    /// is required up front; everything else is validated by `load`.
    pub fn from_state(state: WorkflowState, plugin_root: &Path) -> Result<Self, EngineError> {
        state.get("sequence").map_err(|_| {
            EngineError::InvalidConfig("workflow document has no \"sequence\" section".to_string())
        })?;
        Ok(Self {
            state,
            plugin_root: plugin_root.to_path_buf(),
            plugins: HashMap::new(),
            commands: Vec::new(),
        })
    }

    /// Loads every declared plugin and validates the whole sequence against
    /// the loaded plugins. All violations surface here, before any command
    /// executes.
    #[instrument(skip_all)]
    pub fn load(&mut self, registry: &ModuleRegistry) -> Result<(), EngineError> {
        let declared = self
            .state
            .get("plugins")
            .ok()
            .and_then(Value::as_sequence)
            .ok_or_else(|| {
                EngineError::InvalidConfig(
                    "workflow document has no \"plugins\" list".to_string(),
                )
            })?;

        let mut plugins = HashMap::with_capacity(declared.len());
        for item in declared {
            let id = item.as_str().ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "plugin ids must be strings, got {:?}",
                    item
                ))
            })?;
            let plugin = Plugin::load(&self.plugin_root.join(id), registry)?;
            plugins.insert(id.to_string(), plugin);
        }

        let sequence = self
            .state
            .get("sequence")
            .ok()
            .and_then(Value::as_sequence)
            .ok_or_else(|| {
                EngineError::InvalidConfig("\"sequence\" must be a list of commands".to_string())
            })?;

        let mut commands = Vec::with_capacity(sequence.len());
        for item in sequence {
            let command = Self::parse_command(item, &plugins)?;
            // Argument references must resolve already at load time.
            if let Value::String(path) = &command.args {
                self.state.get(path)?;
            }
            commands.push(command);
        }

        info!(
            plugins = plugins.len(),
            commands = commands.len(),
            "Workflow loaded"
        );
        self.plugins = plugins;
        self.commands = commands;
        Ok(())
    }

    fn parse_command(
        item: &Value,
        plugins: &HashMap<String, Plugin>,
    ) -> Result<Command, EngineError> {
        let map = item.as_mapping().filter(|m| m.len() == 1).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "each sequence command must be a single-entry mapping, got {:?}",
                item
            ))
        })?;
        let (key, args) = map.iter().next().ok_or_else(|| {
            EngineError::InvalidConfig("empty sequence command".to_string())
        })?;

        let key = key.as_str().ok_or_else(|| {
            EngineError::InvalidConfig(format!("command keys must be strings, got {:?}", key))
        })?;
        let (plugin_id, entry) = key.split_once('.').ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "command \"{}\" is not of the form plugin.entry",
                key
            ))
        })?;

        let plugin = plugins.get(plugin_id).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "command \"{}\" names undeclared plugin \"{}\"",
                key, plugin_id
            ))
        })?;
        if !plugin.has_entry(entry) {
            return Err(EngineError::InvalidConfig(format!(
                "command \"{}\" names entry \"{}\" not declared by plugin \"{}\"",
                key, entry, plugin_id
            )));
        }

        Ok(Command {
            plugin: plugin_id.to_string(),
            entry: entry.to_string(),
            args: args.clone(),
        })
    }

    /// Executes the sequence in document order. Command N+1 never starts
    /// before command N returns.
    ///
    /// A command whose arguments are given as a string treats it as a
    /// `|`-separated key path into the state tree, resolved here so that
    /// overrides applied after load still take effect.
    #[instrument(skip_all)]
    pub fn run(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        for command in &self.commands {
            let label = format!("{}.{}", command.plugin, command.entry);
            info!(command = %label, "Executing command");
            ctx.reporter()
                .report(Progress::StatusUpdate { text: label });

            let args = match &command.args {
                Value::String(path) => self.state.get(path)?.clone(),
                other => other.clone(),
            };
            let plugin = &self.plugins[&command.plugin];
            let args = ArgBundle::new(args)?;
            plugin.execute(&command.entry, &args, ctx)?;
        }
        Ok(())
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WorkflowState {
        &mut self.state
    }
}
