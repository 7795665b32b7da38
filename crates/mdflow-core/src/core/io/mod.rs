//! Trajectory file I/O.
//!
//! All campaign artifacts that carry particle+cell data (reference and
//! initial configurations, per-block trajectory frames) use a single fixed
//! columnar dump format; [`traits::TrajectoryFile`] is the seam through
//! which any additional format would be added.

pub mod lammps;
pub mod traits;
