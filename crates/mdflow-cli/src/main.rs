mod cli;
mod error;
mod logging;
mod ui;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use mdflow::engine::progress::ProgressReporter;
use mdflow::workflows;
use tracing::{error, info};

fn main() {
    if let Err(e) = run_app() {
        eprintln!("\nError: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, &cli.log_file)?;
    info!("mdflow v{} starting up", env!("CARGO_PKG_VERSION"));

    let outcome = match cli.command {
        Commands::Run(args) => {
            let overrides = cli::parse_overrides(&args.set_values)?;
            let ui = ui::CliUi::new(cli.quiet);
            let reporter = ProgressReporter::with_callback(Box::new(|p| ui.handle(p)));
            workflows::run_campaign(&args.workflow, &args.plugins_root, &overrides, &reporter)
                .map(|()| {
                    println!("Campaign completed.");
                })
        }
        Commands::Check(args) => {
            let overrides = cli::parse_overrides(&args.set_values)?;
            workflows::check_campaign(&args.workflow, &args.plugins_root, &overrides).map(
                |summary| {
                    println!(
                        "Workflow valid: {} command(s) across {} plugin(s)",
                        summary.commands.len(),
                        summary.plugins.len()
                    );
                    for command in &summary.commands {
                        println!("  {}", command);
                    }
                },
            )
        }
    };

    if let Err(e) = &outcome {
        error!("Command failed: {}", e);
    }
    Ok(outcome?)
}
