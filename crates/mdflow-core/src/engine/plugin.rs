use super::args::ArgBundle;
use super::context::RunContext;
use super::error::EngineError;
use super::registry::{EntryFn, ModuleRegistry};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Metadata describing a plugin: its name, a human-readable description,
/// and the entry points it declares. A manifest lacking a description or
/// an entries list is invalid.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub description: String,
    pub entries: Vec<String>,
}

/// One loaded unit of pluggable behavior: a manifest plus the declared
/// subset of its registered entry table. Created by the kernel, one per
/// distinct id in the workflow's `plugins` list; plugins never reference
/// each other.
pub struct Plugin {
    name: String,
    path: PathBuf,
    manifest: PluginManifest,
    entries: HashMap<String, EntryFn>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("manifest", &self.manifest)
            .field("entries", &self.entries.keys())
            .finish()
    }
}

impl Plugin {
    /// Loads a plugin from its directory, resolving entry points against
    /// the module registry.
    ///
    /// All failures here are load-time and fatal: a missing directory,
    /// missing or invalid manifest, unregistered module, or a declared
    /// entry absent from the registered table.
    pub fn load(path: &Path, registry: &ModuleRegistry) -> Result<Self, EngineError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !path.exists() {
            return Err(EngineError::PluginNotFound {
                name,
                path: path.to_path_buf(),
            });
        }

        let manifest_path = path.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(EngineError::ManifestNotFound {
                name,
                path: manifest_path,
            });
        }

        let manifest_text = fs::read_to_string(&manifest_path)?;
        let manifest: PluginManifest =
            serde_yaml::from_str(&manifest_text).map_err(|e| EngineError::InvalidManifest {
                name: name.clone(),
                message: e.to_string(),
            })?;

        let table = registry
            .get(&name)
            .ok_or_else(|| EngineError::ModuleNotRegistered { name: name.clone() })?;

        let mut entries = HashMap::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            let callable = table
                .get(entry)
                .cloned()
                .ok_or_else(|| EngineError::EntryNotFound {
                    plugin: name.clone(),
                    entry: entry.clone(),
                })?;
            entries.insert(entry.clone(), callable);
        }

        debug!(plugin = %name, entries = manifest.entries.len(), "Plugin loaded");
        Ok(Self {
            name,
            path: path.to_path_buf(),
            manifest,
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn description(&self) -> &str {
        &self.manifest.description
    }

    pub fn has_entry(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    /// Invokes a declared entry point with the given argument bundle.
    ///
    /// If the entry fails and the bundle carries `strict: false`, the error
    /// is logged and swallowed and the caller continues; otherwise it is
    /// wrapped with the plugin/entry names and propagated. This is the only
    /// recoverable-error path in the system.
    pub fn execute(
        &self,
        entry: &str,
        args: &ArgBundle,
        ctx: &mut RunContext,
    ) -> Result<(), EngineError> {
        let callable = self
            .entries
            .get(entry)
            .ok_or_else(|| EngineError::EntryNotFound {
                plugin: self.name.clone(),
                entry: entry.to_string(),
            })?;

        match callable(ctx, args) {
            Ok(()) => Ok(()),
            Err(source) if !args.strict() => {
                warn!(
                    plugin = %self.name,
                    entry,
                    error = %source,
                    "Non-strict entry failed; continuing"
                );
                Ok(())
            }
            Err(source) => Err(EngineError::Execution {
                plugin: self.name.clone(),
                entry: entry.to_string(),
                source: Box::new(source),
            }),
        }
    }
}
