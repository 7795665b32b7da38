use crate::error::{CliError, Result};
use clap::{Args, Parser, Subcommand};
use serde_yaml::Value;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "MDFLOW CLI - A command-line interface for plugin-driven molecular-dynamics campaign workflows with defect and cluster analysis.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a campaign workflow document from start to finish.
    Run(WorkflowArgs),
    /// Validate a workflow document and its plugins without executing it.
    Check(WorkflowArgs),
}

#[derive(Args, Debug)]
pub struct WorkflowArgs {
    /// Path to the workflow document (YAML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub workflow: PathBuf,

    /// Root directory containing one sub-directory per plugin.
    #[arg(short, long, value_name = "PATH", default_value = "plugins")]
    pub plugins_root: PathBuf,

    /// Set a state value, overriding the workflow document.
    /// Can be used multiple times. Example: -S simulation|run_steps=2000
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// Parses `key|path=value` overrides; values are interpreted as YAML
/// scalars, so `2000`, `true` and `bubble` keep their types.
pub fn parse_overrides(raw: &[String]) -> Result<Vec<(String, Value)>> {
    raw.iter()
        .map(|entry| {
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                CliError::Argument(format!(
                    "override \"{}\" is not of the form KEY=VALUE",
                    entry
                ))
            })?;
            let value: Value = serde_yaml::from_str(value).map_err(|e| {
                CliError::Argument(format!("override \"{}\" has an invalid value: {}", entry, e))
            })?;
            Ok((key.to_string(), value))
        })
        .collect()
}
