use crate::analysis::AnalysisError;
use crate::core::io::lammps::TrajError;
use crate::core::snapshot::SnapshotError;
use crate::core::state::StateError;
use crate::engine::args::ArgError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cannot find plugin \"{name}\" at {path}", path = path.display())]
    PluginNotFound { name: String, path: PathBuf },

    #[error("Cannot find manifest for plugin \"{name}\" at {path}", path = path.display())]
    ManifestNotFound { name: String, path: PathBuf },

    #[error("Invalid manifest for plugin \"{name}\": {message}")]
    InvalidManifest { name: String, message: String },

    #[error("No module registered for plugin \"{name}\"")]
    ModuleNotRegistered { name: String },

    #[error("Entry \"{entry}\" not found for plugin \"{plugin}\"")]
    EntryNotFound { plugin: String, entry: String },

    #[error("Plugin \"{plugin}.{entry}\" failed: {source}")]
    Execution {
        plugin: String,
        entry: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Invalid workflow configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument bundle: {source}")]
    Argument {
        #[from]
        source: ArgError,
    },

    #[error("State error: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("Trajectory I/O failed: {source}")]
    Trajectory {
        #[from]
        source: TrajError,
    },

    #[error("Inconsistent snapshot: {source}")]
    Snapshot {
        #[from]
        source: SnapshotError,
    },

    #[error("Analysis failed: {source}")]
    Analysis {
        #[from]
        source: AnalysisError,
    },

    #[error("Dynamics session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
