use super::geometry::PeriodicCell;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(
        "Inconsistent particle arrays: {positions} positions, {velocities} velocities, {types} types"
    )]
    LengthMismatch {
        positions: usize,
        velocities: usize,
        types: usize,
    },
}

/// One particle+cell configuration: positions, velocities and per-particle
/// type inside a periodic cell. Particle identifiers are implicit (1-based
/// array order) and preserved by trajectory I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    positions: Vec<Point3<f64>>,
    velocities: Vec<Vector3<f64>>,
    types: Vec<u32>,
    cell: PeriodicCell,
}

impl Snapshot {
    pub fn new(
        positions: Vec<Point3<f64>>,
        velocities: Vec<Vector3<f64>>,
        types: Vec<u32>,
        cell: PeriodicCell,
    ) -> Result<Self, SnapshotError> {
        if positions.len() != velocities.len() || positions.len() != types.len() {
            return Err(SnapshotError::LengthMismatch {
                positions: positions.len(),
                velocities: velocities.len(),
                types: types.len(),
            });
        }
        Ok(Self {
            positions,
            velocities,
            types,
            cell,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vector3<f64>] {
        &self.velocities
    }

    pub fn types(&self) -> &[u32] {
        &self.types
    }

    pub fn cell(&self) -> &PeriodicCell {
        &self.cell
    }

    /// Returns a copy with every position wrapped into the primary image.
    pub fn wrapped(&self) -> Self {
        Self {
            positions: self.positions.iter().map(|p| self.cell.wrap(p)).collect(),
            velocities: self.velocities.clone(),
            types: self.types.clone(),
            cell: self.cell,
        }
    }
}
