use crate::core::geometry::PeriodicCell;
use crate::engine::error::EngineError;
use crate::engine::session::{DynamicsEngine, EngineFactory, EngineState, SimulationSpec};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A constant-velocity free-flight engine: every step translates each
/// particle by `v * dt` and wraps it back into the periodic cell. There is
/// no force evaluation and the potential energy is identically zero; this
/// engine exists as an external-engine stand-in for demos and tests, not
/// as an integrator offering.
pub struct DriftEngine {
    positions: Vec<Point3<f64>>,
    velocities: Vec<Vector3<f64>>,
    masses: Vec<f64>,
    cell: PeriodicCell,
    time_step: f64,
}

#[derive(Serialize, Deserialize)]
struct DriftCheckpoint {
    positions: Vec<[f64; 3]>,
    velocities: Vec<[f64; 3]>,
}

impl DriftEngine {
    fn kinetic_energy(&self) -> f64 {
        self.velocities
            .iter()
            .zip(&self.masses)
            .map(|(v, m)| 0.5 * m * v.norm_squared())
            .sum()
    }
}

impl DynamicsEngine for DriftEngine {
    fn step(&mut self, steps: u64) -> Result<(), EngineError> {
        for _ in 0..steps {
            for (position, velocity) in self.positions.iter_mut().zip(&self.velocities) {
                *position = self.cell.wrap(&(*position + velocity * self.time_step));
            }
        }
        Ok(())
    }

    fn observe(&self) -> EngineState {
        EngineState {
            positions: self.positions.clone(),
            velocities: self.velocities.clone(),
            potential: 0.0,
            kinetic: self.kinetic_energy(),
            cell: self.cell,
        }
    }

    fn checkpoint(&self) -> Result<Vec<u8>, EngineError> {
        let blob = DriftCheckpoint {
            positions: self.positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
            velocities: self.velocities.iter().map(|v| [v.x, v.y, v.z]).collect(),
        };
        serde_json::to_vec(&blob)
            .map_err(|e| EngineError::Session(format!("checkpoint serialization failed: {}", e)))
    }

    fn restore(&mut self, blob: &[u8]) -> Result<(), EngineError> {
        let checkpoint: DriftCheckpoint = serde_json::from_slice(blob)
            .map_err(|e| EngineError::Session(format!("checkpoint blob is corrupt: {}", e)))?;
        if checkpoint.positions.len() != self.positions.len()
            || checkpoint.velocities.len() != self.velocities.len()
        {
            return Err(EngineError::Session(format!(
                "checkpoint holds {} particles, session has {}",
                checkpoint.positions.len(),
                self.positions.len()
            )));
        }
        self.positions = checkpoint
            .positions
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        self.velocities = checkpoint
            .velocities
            .iter()
            .map(|v| Vector3::new(v[0], v[1], v[2]))
            .collect();
        Ok(())
    }
}

pub struct DriftEngineFactory;

impl EngineFactory for DriftEngineFactory {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn create(&self, spec: SimulationSpec) -> Result<Box<dyn DynamicsEngine>, EngineError> {
        if spec.is_empty() {
            return Err(EngineError::Session(
                "cannot create a drift session without particles".to_string(),
            ));
        }
        let cell = spec.cell;
        let positions = spec
            .positions
            .iter()
            .map(|p| cell.wrap(p))
            .collect();
        Ok(Box::new(DriftEngine {
            positions,
            velocities: spec.velocities,
            masses: spec.masses,
            cell,
            time_step: spec.time_step,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;
    use std::collections::HashMap;

    fn session() -> Box<dyn DynamicsEngine> {
        let spec = SimulationSpec {
            positions: vec![Point3::new(1.0, 1.0, 1.0), Point3::new(9.5, 5.0, 5.0)],
            velocities: vec![Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)],
            types: vec![1, 2],
            masses: vec![2.0, 4.0],
            cell: PeriodicCell::cubic(10.0),
            time_step: 0.5,
            params: Value::Null,
        };
        DriftEngineFactory.create(spec).unwrap()
    }

    #[test]
    fn step_translates_and_wraps() {
        let mut engine = session();
        engine.step(2).unwrap();
        let state = engine.observe();
        assert!((state.positions[0].x - 2.0).abs() < 1e-12);
        // 9.5 + 2 steps * 0.5 * 2.0 = 11.5 -> wrapped to 1.5
        assert!((state.positions[1].x - 1.5).abs() < 1e-12);
    }

    #[test]
    fn energies_are_constant_under_drift() {
        let mut engine = session();
        let before = engine.observe();
        engine.step(7).unwrap();
        let after = engine.observe();
        assert_eq!(before.potential, 0.0);
        assert!((before.kinetic - after.kinetic).abs() < 1e-12);
        // 0.5*2*1 + 0.5*4*4 = 9
        assert!((before.kinetic - 9.0).abs() < 1e-12);
    }

    #[test]
    fn checkpoint_round_trip_restores_state() {
        let mut engine = session();
        engine.step(3).unwrap();
        let blob = engine.checkpoint().unwrap();
        let reference = engine.observe();

        engine.step(5).unwrap();
        engine.restore(&blob).unwrap();
        let restored = engine.observe();
        for (a, b) in restored.positions.iter().zip(&reference.positions) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn corrupt_checkpoint_is_rejected() {
        let mut engine = session();
        assert!(matches!(
            engine.restore(b"not json"),
            Err(EngineError::Session(_))
        ));
    }

    #[test]
    fn missing_mass_for_type_fails_spec_construction() {
        let snapshot = crate::core::snapshot::Snapshot::new(
            vec![Point3::origin()],
            vec![Vector3::zeros()],
            vec![7],
            PeriodicCell::cubic(5.0),
        )
        .unwrap();
        let err = SimulationSpec::from_snapshot(snapshot, &HashMap::new(), 1.0, Value::Null)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
