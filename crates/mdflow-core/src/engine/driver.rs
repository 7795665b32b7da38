use super::context::ActiveSession;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::session::DynamicsEngine;
use crate::core::geometry::PeriodicCell;
use crate::core::io::lammps::{DumpMetadata, LammpsDumpFile};
use crate::core::io::traits::TrajectoryFile;
use crate::core::snapshot::Snapshot;
use crossbeam_channel::bounded;
use nalgebra::{Point3, Vector3};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info};

/// Step-block parameters and artifact locations of one simulation run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Total integration steps; only complete blocks are executed.
    pub run_steps: u64,
    /// Steps per averaging block.
    pub average_steps: u64,
    /// Unrecorded steps after each block.
    pub skip_steps: u64,
    /// Checkpoint interval in cumulative steps; 0 disables checkpointing.
    pub checkpoint_steps: u64,
    pub trajectory_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub energy_path: PathBuf,
}

impl DriverConfig {
    fn block_steps(&self) -> u64 {
        self.average_steps + self.skip_steps
    }
}

/// Per-block aggregate produced by the driver: block-averaged energies and
/// particle arrays, plus the checkpoint blob when one was due. Consumed
/// immediately after production and not retained.
#[derive(Debug, Clone)]
pub struct BlockObservables {
    /// Step label of the block (cumulative steps at block start).
    pub step: u64,
    /// Cumulative steps integrated after this block.
    pub steps_done: u64,
    pub potential: f64,
    pub kinetic: f64,
    pub positions: Vec<Point3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub cell: PeriodicCell,
    pub checkpoint: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
struct BlockPlan {
    label: u64,
    steps_done: u64,
    want_checkpoint: bool,
}

/// Downstream consumer of each block (typically the analysis engine).
pub trait BlockConsumer {
    fn consume(&mut self, snapshot: &Snapshot, block: &BlockObservables)
    -> Result<(), EngineError>;
}

/// A consumer that discards every block.
impl BlockConsumer for () {
    fn consume(&mut self, _: &Snapshot, _: &BlockObservables) -> Result<(), EngineError> {
        Ok(())
    }
}

fn compute_block(
    session: &mut dyn DynamicsEngine,
    average_steps: u64,
    skip_steps: u64,
    plan: BlockPlan,
) -> Result<BlockObservables, EngineError> {
    let mut position_sums: Vec<Vector3<f64>> = Vec::new();
    let mut velocity_sums: Vec<Vector3<f64>> = Vec::new();
    let mut potential_sum = 0.0;
    let mut kinetic_sum = 0.0;
    let mut cell = PeriodicCell::cubic(0.0);

    for sample in 0..average_steps {
        session.step(1)?;
        let state = session.observe();
        if sample == 0 {
            position_sums = vec![Vector3::zeros(); state.positions.len()];
            velocity_sums = vec![Vector3::zeros(); state.velocities.len()];
        }
        for (sum, position) in position_sums.iter_mut().zip(&state.positions) {
            *sum += position.coords;
        }
        for (sum, velocity) in velocity_sums.iter_mut().zip(&state.velocities) {
            *sum += velocity;
        }
        potential_sum += state.potential;
        kinetic_sum += state.kinetic;
        cell = state.cell;
    }

    if skip_steps > 0 {
        session.step(skip_steps)?;
    }

    let samples = average_steps as f64;
    let checkpoint = if plan.want_checkpoint {
        Some(session.checkpoint()?)
    } else {
        None
    };

    Ok(BlockObservables {
        step: plan.label,
        steps_done: plan.steps_done,
        potential: potential_sum / samples,
        kinetic: kinetic_sum / samples,
        positions: position_sums
            .into_iter()
            .map(|sum| Point3::from(sum / samples))
            .collect(),
        velocities: velocity_sums.into_iter().map(|sum| sum / samples).collect(),
        cell,
        checkpoint,
    })
}

/// Owns one dynamics session and advances it in averaging blocks, emitting
/// one [`BlockObservables`] per block, exporting trajectory/energy/checkpoint
/// artifacts, and forwarding each block to the consumer.
pub struct Driver {
    config: DriverConfig,
    session: Option<Box<dyn DynamicsEngine>>,
    types: Vec<u32>,
}

impl Driver {
    pub fn new(config: DriverConfig, active: ActiveSession) -> Result<Self, EngineError> {
        if config.average_steps == 0 {
            return Err(EngineError::InvalidConfig(
                "average_steps must be at least 1".to_string(),
            ));
        }
        if config.run_steps < config.block_steps() {
            return Err(EngineError::InvalidConfig(format!(
                "run_steps ({}) shorter than one block ({})",
                config.run_steps,
                config.block_steps()
            )));
        }
        Ok(Self {
            config,
            session: Some(active.session),
            types: active.types,
        })
    }

    /// Plans every block ahead of time. A checkpoint is due when the
    /// cumulative step count crosses a multiple of `checkpoint_steps`; one
    /// extra checkpoint is forced on the last block only when its step
    /// count is not already checkpointed, so aligned runs never write a
    /// duplicate.
    fn plan(&self) -> Vec<BlockPlan> {
        let block_steps = self.config.block_steps();
        let blocks = self.config.run_steps / block_steps;
        let interval = self.config.checkpoint_steps;

        let mut plans = Vec::with_capacity(blocks as usize);
        let mut saved = 0u64;
        for block in 0..blocks {
            let steps_done = (block + 1) * block_steps;
            let mut want_checkpoint = false;
            if interval > 0 && steps_done / interval > saved {
                want_checkpoint = true;
                saved += 1;
            }
            plans.push(BlockPlan {
                label: block * block_steps,
                steps_done,
                want_checkpoint,
            });
        }
        if interval > 0 {
            if let Some(last) = plans.last_mut() {
                last.want_checkpoint = true;
            }
        }
        plans
    }

    /// Runs every block on the calling thread, strictly serially.
    pub fn run(
        mut self,
        reporter: &ProgressReporter,
        consumer: &mut dyn BlockConsumer,
    ) -> Result<(), EngineError> {
        let plans = self.plan();
        let mut session = self.take_session()?;
        info!(blocks = plans.len(), "Starting simulation run");
        reporter.report(Progress::TaskStart {
            total_steps: plans.len() as u64,
        });

        for plan in plans {
            let block = compute_block(
                session.as_mut(),
                self.config.average_steps,
                self.config.skip_steps,
                plan,
            )?;
            self.deliver(&block, consumer)?;
            reporter.report(Progress::TaskIncrement);
        }

        reporter.report(Progress::TaskFinish);
        info!("Simulation run finished");
        Ok(())
    }

    /// Runs with one background worker integrating block N+1 while block N
    /// is consumed. Channels are single-slot and the worker result is
    /// awaited before the following submission, so pipelining depth never
    /// exceeds one and blocks are delivered strictly in step order.
    pub fn run_pipelined(
        mut self,
        reporter: &ProgressReporter,
        consumer: &mut dyn BlockConsumer,
    ) -> Result<(), EngineError> {
        let plans = self.plan();
        let mut session = self.take_session()?;
        let average_steps = self.config.average_steps;
        let skip_steps = self.config.skip_steps;

        info!(blocks = plans.len(), "Starting pipelined simulation run");
        reporter.report(Progress::TaskStart {
            total_steps: plans.len() as u64,
        });

        let (plan_tx, plan_rx) = bounded::<BlockPlan>(1);
        let (result_tx, result_rx) = bounded::<Result<BlockObservables, EngineError>>(1);

        let worker = thread::spawn(move || {
            for plan in plan_rx.iter() {
                let outcome = compute_block(session.as_mut(), average_steps, skip_steps, plan);
                let failed = outcome.is_err();
                if result_tx.send(outcome).is_err() || failed {
                    break;
                }
            }
        });

        let disconnected = || EngineError::Session("simulation worker disconnected".to_string());

        let mut pending = plans.into_iter();
        let mut in_flight = 0usize;
        let mut outcome = Ok(());

        if let Some(first) = pending.next() {
            plan_tx.send(first).map_err(|_| disconnected())?;
            in_flight = 1;
        }

        while in_flight > 0 {
            let received = match result_rx.recv() {
                Ok(result) => result,
                Err(_) => {
                    outcome = Err(disconnected());
                    break;
                }
            };
            in_flight -= 1;

            let block = match received {
                Ok(block) => block,
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            };

            // Submit the next block before consuming this one; that overlap
            // is the entire pipeline.
            if let Some(next) = pending.next() {
                if plan_tx.send(next).is_err() {
                    outcome = Err(disconnected());
                    break;
                }
                in_flight += 1;
            }

            if let Err(error) = self.deliver(&block, consumer) {
                outcome = Err(error);
                break;
            }
            reporter.report(Progress::TaskIncrement);
        }

        drop(plan_tx);
        worker
            .join()
            .map_err(|_| EngineError::Session("simulation worker panicked".to_string()))?;
        outcome?;

        reporter.report(Progress::TaskFinish);
        info!("Pipelined simulation run finished");
        Ok(())
    }

    fn take_session(&mut self) -> Result<Box<dyn DynamicsEngine>, EngineError> {
        self.session
            .take()
            .ok_or_else(|| EngineError::Session("driver session already consumed".to_string()))
    }

    fn deliver(
        &self,
        block: &BlockObservables,
        consumer: &mut dyn BlockConsumer,
    ) -> Result<(), EngineError> {
        let snapshot = Snapshot::new(
            block.positions.clone(),
            block.velocities.clone(),
            self.types.clone(),
            block.cell,
        )?;

        let trajectory_path = self.config.trajectory_dir.join(format!("{}.trj", block.step));
        LammpsDumpFile::write_to_path(
            &snapshot,
            &DumpMetadata {
                timestep: block.step,
            },
            &trajectory_path,
        )?;

        self.append_energy(block)?;

        if let Some(blob) = &block.checkpoint {
            let checkpoint_path = self
                .config
                .checkpoint_dir
                .join(format!("{}.checkpoint", block.steps_done));
            std::fs::write(&checkpoint_path, blob)?;
            debug!(path = %checkpoint_path.display(), "Checkpoint written");
        }

        consumer.consume(&snapshot, block)
    }

    fn append_energy(&self, block: &BlockObservables) -> Result<(), EngineError> {
        let fresh = !self.config.energy_path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.energy_path)?;
        if fresh {
            writeln!(file, "step,u,t,e")?;
        }
        writeln!(
            file,
            "{},{},{},{}",
            block.step,
            block.potential,
            block.kinetic,
            block.potential + block.kinetic
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::EngineState;
    use std::fs;
    use std::path::Path;

    /// Constant-energy stand-in: energies never change, positions never move.
    struct ConstEngine {
        potential: f64,
        kinetic: f64,
        count: usize,
    }

    impl DynamicsEngine for ConstEngine {
        fn step(&mut self, _steps: u64) -> Result<(), EngineError> {
            Ok(())
        }

        fn observe(&self) -> EngineState {
            EngineState {
                positions: vec![Point3::new(1.0, 2.0, 3.0); self.count],
                velocities: vec![Vector3::new(0.1, 0.2, 0.3); self.count],
                potential: self.potential,
                kinetic: self.kinetic,
                cell: PeriodicCell::cubic(10.0),
            }
        }

        fn checkpoint(&self) -> Result<Vec<u8>, EngineError> {
            Ok(b"blob".to_vec())
        }

        fn restore(&mut self, _blob: &[u8]) -> Result<(), EngineError> {
            Ok(())
        }
    }

    struct Recorder {
        blocks: Vec<(u64, f64, f64)>,
    }

    impl BlockConsumer for Recorder {
        fn consume(
            &mut self,
            _snapshot: &Snapshot,
            block: &BlockObservables,
        ) -> Result<(), EngineError> {
            self.blocks.push((block.step, block.potential, block.kinetic));
            Ok(())
        }
    }

    fn config_in(dir: &Path, run_steps: u64, average_steps: u64, checkpoint_steps: u64) -> DriverConfig {
        let trajectory_dir = dir.join("trajectory");
        let checkpoint_dir = dir.join("checkpoints");
        fs::create_dir_all(&trajectory_dir).unwrap();
        fs::create_dir_all(&checkpoint_dir).unwrap();
        DriverConfig {
            run_steps,
            average_steps,
            skip_steps: 0,
            checkpoint_steps,
            trajectory_dir,
            checkpoint_dir,
            energy_path: dir.join("energy.csv"),
        }
    }

    fn const_session(potential: f64, kinetic: f64) -> ActiveSession {
        ActiveSession {
            session: Box::new(ConstEngine {
                potential,
                kinetic,
                count: 2,
            }),
            types: vec![1, 1],
        }
    }

    fn checkpoint_steps_written(dir: &Path) -> Vec<u64> {
        let mut steps: Vec<u64> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let name = entry.unwrap().file_name();
                let name = name.to_string_lossy();
                name.strip_suffix(".checkpoint").unwrap().parse().unwrap()
            })
            .collect();
        steps.sort_unstable();
        steps
    }

    #[test]
    fn constant_energies_average_to_themselves() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 10, 10, 0);
        let driver = Driver::new(config.clone(), const_session(2.5, 1.5)).unwrap();

        let mut recorder = Recorder { blocks: Vec::new() };
        driver.run(&ProgressReporter::new(), &mut recorder).unwrap();

        assert_eq!(recorder.blocks.len(), 1);
        let (step, u, t) = recorder.blocks[0];
        assert_eq!(step, 0);
        assert_eq!(u, 2.5);
        assert_eq!(t, 1.5);

        let energy = fs::read_to_string(&config.energy_path).unwrap();
        let mut lines = energy.lines();
        assert_eq!(lines.next().unwrap(), "step,u,t,e");
        assert_eq!(lines.next().unwrap(), "0,2.5,1.5,4");
    }

    #[test]
    fn checkpoints_cross_interval_and_force_unaligned_final() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 25, 5, 10);
        let driver = Driver::new(config.clone(), const_session(0.0, 0.0)).unwrap();
        driver.run(&ProgressReporter::new(), &mut ()).unwrap();

        assert_eq!(
            checkpoint_steps_written(&config.checkpoint_dir),
            vec![10, 20, 25]
        );
    }

    #[test]
    fn aligned_final_step_is_not_checkpointed_twice() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 20, 5, 10);
        let driver = Driver::new(config.clone(), const_session(0.0, 0.0)).unwrap();
        driver.run(&ProgressReporter::new(), &mut ()).unwrap();

        assert_eq!(checkpoint_steps_written(&config.checkpoint_dir), vec![10, 20]);
    }

    #[test]
    fn zero_interval_disables_checkpointing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 20, 5, 0);
        let driver = Driver::new(config.clone(), const_session(0.0, 0.0)).unwrap();
        driver.run(&ProgressReporter::new(), &mut ()).unwrap();

        assert!(checkpoint_steps_written(&config.checkpoint_dir).is_empty());
    }

    #[test]
    fn trajectory_frames_are_labeled_by_block_start() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 15, 5, 0);
        let driver = Driver::new(config.clone(), const_session(1.0, 1.0)).unwrap();
        driver.run(&ProgressReporter::new(), &mut ()).unwrap();

        for step in [0u64, 5, 10] {
            assert!(config.trajectory_dir.join(format!("{}.trj", step)).exists());
        }
    }

    #[test]
    fn pipelined_run_matches_serial_ordering() {
        let serial_dir = tempfile::tempdir().unwrap();
        let pipelined_dir = tempfile::tempdir().unwrap();

        let serial = Driver::new(
            config_in(serial_dir.path(), 30, 5, 10),
            const_session(3.0, 4.0),
        )
        .unwrap();
        let mut serial_rec = Recorder { blocks: Vec::new() };
        serial.run(&ProgressReporter::new(), &mut serial_rec).unwrap();

        let pipelined = Driver::new(
            config_in(pipelined_dir.path(), 30, 5, 10),
            const_session(3.0, 4.0),
        )
        .unwrap();
        let mut pipelined_rec = Recorder { blocks: Vec::new() };
        pipelined
            .run_pipelined(&ProgressReporter::new(), &mut pipelined_rec)
            .unwrap();

        assert_eq!(serial_rec.blocks, pipelined_rec.blocks);
        assert_eq!(
            checkpoint_steps_written(&serial_dir.path().join("checkpoints")),
            checkpoint_steps_written(&pipelined_dir.path().join("checkpoints")),
        );
    }

    #[test]
    fn run_shorter_than_one_block_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 3, 5, 0);
        assert!(matches!(
            Driver::new(config, const_session(0.0, 0.0)),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
