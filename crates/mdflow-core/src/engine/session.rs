use super::error::EngineError;
use crate::core::geometry::PeriodicCell;
use crate::core::snapshot::Snapshot;
use nalgebra::{Point3, Vector3};
use serde_yaml::Value;
use std::collections::HashMap;

/// One observed state of a dynamics-engine session.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub positions: Vec<Point3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub potential: f64,
    pub kinetic: f64,
    pub cell: PeriodicCell,
}

/// The narrow interface through which external physics engines are
/// consumed: advance, observe, checkpoint, restore. Nothing else about an
/// engine is visible to the driver.
pub trait DynamicsEngine: Send {
    /// Advances the integration by `steps` time steps.
    fn step(&mut self, steps: u64) -> Result<(), EngineError>;

    /// Returns the current state (positions, velocities, energies, cell).
    fn observe(&self) -> EngineState;

    /// Serializes the full engine state into an opaque blob.
    fn checkpoint(&self) -> Result<Vec<u8>, EngineError>;

    /// Restores engine state from a blob previously produced by
    /// [`DynamicsEngine::checkpoint`] on the same engine kind.
    fn restore(&mut self, blob: &[u8]) -> Result<(), EngineError>;
}

/// Everything needed to start a dynamics session. Consumed by value when
/// the session is created; the spec cannot be reused afterwards.
#[derive(Debug, Clone)]
pub struct SimulationSpec {
    pub positions: Vec<Point3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub types: Vec<u32>,
    pub masses: Vec<f64>,
    pub cell: PeriodicCell,
    pub time_step: f64,
    /// Engine-specific parameters, passed through opaquely.
    pub params: Value,
}

impl SimulationSpec {
    /// Builds a spec from an imported configuration snapshot, resolving
    /// per-particle masses from a per-type mass table.
    pub fn from_snapshot(
        snapshot: Snapshot,
        masses_by_type: &HashMap<u32, f64>,
        time_step: f64,
        params: Value,
    ) -> Result<Self, EngineError> {
        let mut masses = Vec::with_capacity(snapshot.len());
        for particle_type in snapshot.types() {
            let mass = masses_by_type.get(particle_type).ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "no mass declared for particle type {}",
                    particle_type
                ))
            })?;
            masses.push(*mass);
        }

        let cell = *snapshot.cell();
        let types = snapshot.types().to_vec();
        let velocities = snapshot.velocities().to_vec();
        let positions = snapshot.positions().to_vec();
        Ok(Self {
            positions,
            velocities,
            types,
            masses,
            cell,
            time_step,
            params,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Creates dynamics sessions of one engine kind from a consumed spec.
pub trait EngineFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn create(&self, spec: SimulationSpec) -> Result<Box<dyn DynamicsEngine>, EngineError>;
}

/// Registry of available engine factories, keyed by engine name.
#[derive(Default)]
pub struct EngineRegistry {
    factories: HashMap<&'static str, Box<dyn EngineFactory>>,
}

impl EngineRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The registry with every built-in engine factory.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(crate::engine::engines::drift::DriftEngineFactory));
        registry
    }

    pub fn register(&mut self, factory: Box<dyn EngineFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    pub fn create(
        &self,
        name: &str,
        spec: SimulationSpec,
    ) -> Result<Box<dyn DynamicsEngine>, EngineError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            EngineError::Session(format!("unknown dynamics engine \"{}\"", name))
        })?;
        factory.create(spec)
    }
}
