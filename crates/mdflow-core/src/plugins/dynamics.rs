use crate::analysis::engine::{AnalysisConfig, AnalysisEngine};
use crate::analysis::watch::{CompletionToken, TrajectoryWatcher};
use crate::core::io::lammps::LammpsDumpFile;
use crate::core::io::traits::TrajectoryFile;
use crate::core::snapshot::Snapshot;
use crate::engine::args::ArgBundle;
use crate::engine::context::{ActiveSession, RunContext};
use crate::engine::driver::{BlockConsumer, BlockObservables, Driver, DriverConfig};
use crate::engine::error::EngineError;
use crate::engine::registry::EntryTable;
use crate::engine::session::SimulationSpec;
use serde_yaml::Value;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Dynamics-session lifecycle: engine creation, stepped simulation with
/// per-block analysis, and off-line trajectory analysis.
pub fn entry_table() -> EntryTable {
    EntryTable::new()
        .register("init", init)
        .register("simulate", simulate)
        .register("analyze", analyze)
}

/// `dynamics.init`: imports a configuration, builds the simulation spec
/// (consumed by the engine factory), optionally restores a checkpoint and
/// installs the session in the run context.
fn init(ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    let input = args.path("input")?;
    let engine_name = args.str_or("engine", "drift")?;
    let time_step = args.f64("time_step")?;
    let masses = args.f64_by_type("masses")?;
    let params = args.get("params").cloned().unwrap_or(Value::Null);

    let (snapshot, _) = LammpsDumpFile::read_from_path(&input)?;
    let types = snapshot.types().to_vec();
    let spec = SimulationSpec::from_snapshot(snapshot, &masses, time_step, params)?;
    let mut session = ctx.engines().create(engine_name, spec)?;

    if let Some(checkpoint) = args.path_opt("restore")? {
        let blob = fs::read(&checkpoint)?;
        session.restore(&blob)?;
        info!(checkpoint = %checkpoint.display(), "Session state restored");
    }

    info!(engine = engine_name, particles = types.len(), "Dynamics session created");
    ctx.install_session(ActiveSession { session, types });
    Ok(())
}

/// Feeds each simulation block into the analysis engine, when one is
/// configured.
struct AnalysisSink {
    engine: Option<AnalysisEngine>,
}

impl BlockConsumer for AnalysisSink {
    fn consume(
        &mut self,
        snapshot: &Snapshot,
        block: &BlockObservables,
    ) -> Result<(), EngineError> {
        if let Some(engine) = &mut self.engine {
            engine.process_frame(snapshot, block.step, Some((block.potential, block.kinetic)))?;
        }
        Ok(())
    }
}

fn analysis_config(args: &ArgBundle) -> Result<AnalysisConfig, EngineError> {
    Ok(AnalysisConfig {
        reference_path: args.path("reference")?,
        cutoff: args.f64("cutoff")?,
        flush_every: args.u64_or("flush_every", 10)? as usize,
        table_dir: args.path("tables")?,
        plot_dir: args.path("plots")?,
    })
}

/// `dynamics.simulate`: takes the active session, runs the block-averaging
/// driver (serial or pipelined) and finalizes the per-block analysis.
fn simulate(ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    let active = ctx.take_session()?;

    let trajectory_dir = args.path("trajectory_dir")?;
    let checkpoint_dir = args
        .path_opt("checkpoint_dir")?
        .unwrap_or_else(|| trajectory_dir.clone());
    let config = DriverConfig {
        run_steps: args.u64("run_steps")?,
        average_steps: args.u64("average_steps")?,
        skip_steps: args.u64_or("skip_steps", 0)?,
        checkpoint_steps: args.u64_or("checkpoint_steps", 0)?,
        trajectory_dir,
        checkpoint_dir,
        energy_path: args.path("energy")?,
    };
    let pipelined = args.bool_or("pipelined", false)?;

    let mut sink = AnalysisSink { engine: None };
    if let Some(analysis) = args.bundle_opt("analysis")? {
        sink.engine = Some(AnalysisEngine::new(analysis_config(&analysis)?)?);
    }

    let driver = Driver::new(config, active)?;
    if pipelined {
        driver.run_pipelined(ctx.reporter(), &mut sink)?;
    } else {
        driver.run(ctx.reporter(), &mut sink)?;
    }

    if let Some(engine) = sink.engine.take() {
        engine.finalize()?;
    }
    Ok(())
}

/// `dynamics.analyze`: off-line pull-mode analysis of a trajectory
/// directory. The completion token is set up front, so a single sweep
/// processes every numbered frame file in step order.
fn analyze(_ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    let trajectory_dir = args.path("trajectory_dir")?;
    let poll_ms = args.u64_or("poll_ms", 500)?;
    let mut engine = AnalysisEngine::new(analysis_config(args)?)?;

    let token = CompletionToken::new();
    token.finish();
    let watcher = TrajectoryWatcher::new(&trajectory_dir, Duration::from_millis(poll_ms));
    watcher.watch(&token, |path| engine.process_file(path))?;

    engine.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::PeriodicCell;
    use crate::core::io::lammps::DumpMetadata;
    use crate::engine::progress::ProgressReporter;
    use nalgebra::{Point3, Vector3};
    use std::path::Path;

    fn write_input(path: &Path) {
        let snapshot = Snapshot::new(
            vec![
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(3.0, 1.0, 1.0),
                Point3::new(1.0, 3.0, 1.0),
                Point3::new(3.0, 3.0, 1.0),
            ],
            vec![Vector3::new(0.5, 0.0, 0.0); 4],
            vec![1; 4],
            PeriodicCell::cubic(6.0),
        )
        .unwrap();
        LammpsDumpFile::write_to_path(&snapshot, &DumpMetadata::default(), path).unwrap();
    }

    fn call(ctx: &mut RunContext, entry: &str, yaml: &str) -> Result<(), EngineError> {
        let args = ArgBundle::new(serde_yaml::from_str(yaml).unwrap()).unwrap();
        entry_table().get(entry).unwrap()(ctx, &args)
    }

    fn init_yaml(input: &Path) -> String {
        format!(
            "input: {}\ntime_step: 0.1\nmasses: {{1: 4.0}}\n",
            input.display()
        )
    }

    #[test]
    fn simulate_without_init_fails_with_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ProgressReporter::new();
        let mut ctx = RunContext::new(&reporter);
        let err = call(
            &mut ctx,
            "simulate",
            &format!(
                "run_steps: 10\naverage_steps: 5\ntrajectory_dir: {0}\nenergy: {0}/energy.csv\n",
                dir.path().display()
            ),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Session(_)));
    }

    #[test]
    fn init_then_simulate_exports_blocks_and_consumes_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("initial.trj");
        write_input(&input);
        let trajectory_dir = dir.path().join("trajectory");
        fs::create_dir(&trajectory_dir).unwrap();

        let reporter = ProgressReporter::new();
        let mut ctx = RunContext::new(&reporter);
        call(&mut ctx, "init", &init_yaml(&input)).unwrap();
        assert!(ctx.has_session());

        let simulate_yaml = format!(
            "run_steps: 20\naverage_steps: 5\ntrajectory_dir: {}\nenergy: {}/energy.csv\n",
            trajectory_dir.display(),
            dir.path().display()
        );
        call(&mut ctx, "simulate", &simulate_yaml).unwrap();

        for step in [0u64, 5, 10, 15] {
            assert!(trajectory_dir.join(format!("{}.trj", step)).exists());
        }
        assert!(dir.path().join("energy.csv").exists());

        // The session moved into the driver; a second simulate has none.
        assert!(!ctx.has_session());
        assert!(matches!(
            call(&mut ctx, "simulate", &simulate_yaml),
            Err(EngineError::Session(_))
        ));
    }

    #[test]
    fn restore_resumes_from_a_checkpoint_blob() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("initial.trj");
        write_input(&input);
        let trajectory_dir = dir.path().join("trajectory");
        fs::create_dir(&trajectory_dir).unwrap();

        let reporter = ProgressReporter::new();
        let mut ctx = RunContext::new(&reporter);
        call(&mut ctx, "init", &init_yaml(&input)).unwrap();
        call(
            &mut ctx,
            "simulate",
            &format!(
                "run_steps: 10\naverage_steps: 5\ncheckpoint_steps: 10\n\
                 trajectory_dir: {}\nenergy: {}/energy.csv\n",
                trajectory_dir.display(),
                dir.path().display()
            ),
        )
        .unwrap();
        let checkpoint = trajectory_dir.join("10.checkpoint");
        assert!(checkpoint.exists());

        call(
            &mut ctx,
            "init",
            &format!("{}restore: {}\n", init_yaml(&input), checkpoint.display()),
        )
        .unwrap();
        assert!(ctx.has_session());
    }

    #[test]
    fn analyze_sweeps_a_finished_trajectory_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("initial.trj");
        write_input(&input);
        let trajectory_dir = dir.path().join("trajectory");
        let tables = dir.path().join("tables");
        fs::create_dir_all(&trajectory_dir).unwrap();
        fs::create_dir_all(&tables).unwrap();

        let reporter = ProgressReporter::new();
        let mut ctx = RunContext::new(&reporter);
        call(&mut ctx, "init", &init_yaml(&input)).unwrap();
        call(
            &mut ctx,
            "simulate",
            &format!(
                "run_steps: 20\naverage_steps: 5\ntrajectory_dir: {}\nenergy: {}/energy.csv\n",
                trajectory_dir.display(),
                dir.path().display()
            ),
        )
        .unwrap();

        call(
            &mut ctx,
            "analyze",
            &format!(
                "trajectory_dir: {}\nreference: {}\ncutoff: 2.5\ntables: {}\nplots: {}\n",
                trajectory_dir.display(),
                input.display(),
                tables.display(),
                tables.display()
            ),
        )
        .unwrap();

        let defects = fs::read_to_string(tables.join("defects.csv")).unwrap();
        // Header plus one row per exported block.
        assert_eq!(defects.lines().count(), 5);
        // Off-line analysis has no energies.
        assert!(!tables.join("thermo.csv").exists());
    }
}
