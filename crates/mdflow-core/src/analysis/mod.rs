//! Per-frame defect analysis: site occupancy against a reference lattice,
//! connectivity clustering of vacant sites, accumulated series with CSV and
//! PNG output, and a polling trajectory watcher for off-line analysis.

pub mod cluster;
pub mod engine;
pub mod occupancy;
pub mod plot;
pub mod series;
pub mod watch;

use crate::core::io::lammps::TrajError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Trajectory I/O failed: {0}")]
    Trajectory(#[from] TrajError),

    #[error("Failed to render plot: {0}")]
    Plot(String),

    #[error("Reference configuration has no sites")]
    EmptyReference,
}
