use crate::engine::context::RunContext;
use crate::engine::error::EngineError;
use crate::engine::kernel::Kernel;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::registry::ModuleRegistry;
use serde_yaml::Value;
use std::path::Path;
use tracing::{info, instrument};

/// What `check` reports: the validated command list of a workflow.
#[derive(Debug, Clone)]
pub struct CampaignSummary {
    pub plugins: Vec<String>,
    pub commands: Vec<String>,
}

fn load_kernel(
    workflow: &Path,
    plugin_root: &Path,
    overrides: &[(String, Value)],
) -> Result<Kernel, EngineError> {
    let mut kernel = Kernel::new(workflow, plugin_root)?;
    for (key, value) in overrides {
        kernel.state_mut().set(key, value.clone())?;
    }
    kernel.load(&ModuleRegistry::builtin())?;
    Ok(kernel)
}

/// Runs a complete campaign: loads the workflow document, applies
/// `key|path=value` overrides to the state tree, validates every command,
/// then executes the sequence.
#[instrument(skip_all, fields(workflow = %workflow.display()))]
pub fn run_campaign(
    workflow: &Path,
    plugin_root: &Path,
    overrides: &[(String, Value)],
    reporter: &ProgressReporter,
) -> Result<(), EngineError> {
    reporter.report(Progress::PhaseStart { name: "Loading workflow" });
    let kernel = load_kernel(workflow, plugin_root, overrides)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Running campaign" });
    let mut ctx = RunContext::new(reporter);
    kernel.run(&mut ctx)?;
    reporter.report(Progress::PhaseFinish);

    info!("Campaign finished");
    Ok(())
}

/// Validates a workflow without executing anything: plugins load, manifests
/// parse, and every sequence command resolves.
pub fn check_campaign(
    workflow: &Path,
    plugin_root: &Path,
    overrides: &[(String, Value)],
) -> Result<CampaignSummary, EngineError> {
    let kernel = load_kernel(workflow, plugin_root, overrides)?;
    let mut plugins: Vec<String> = kernel
        .commands()
        .iter()
        .map(|command| command.plugin.clone())
        .collect();
    plugins.sort();
    plugins.dedup();

    Ok(CampaignSummary {
        plugins,
        commands: kernel
            .commands()
            .iter()
            .map(|command| format!("{}.{}", command.plugin, command.entry))
            .collect(),
    })
}
