//! installkit - command line entry point
//!
//! Loads a plan file, then validates, prints or runs it.

use anyhow::{Context, Result};
use installkit::cli::{Cli, Commands};
use installkit::plan_file::PlanFile;
use std::path::Path;
use std::process::ExitCode;
use installkit::InstallError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Initialize the logger with appropriate settings
fn init_logger() {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<PlanFile> {
    let plan = PlanFile::load_from_file(path)?;
    plan.validate()
        .with_context(|| format!("Plan file {:?} is invalid", path))?;
    Ok(plan)
}

fn run(path: &Path, dry_run: bool) -> Result<bool> {
    let file = load(path)?;
    let mut plan = file
        .build_plan(dry_run)?
        .on_action_title(|title| info!("==> {}", title))
        .on_group_progress(|fraction| debug!("group {:.0}%", fraction * 100.0))
        .on_overall_progress(|fraction| info!("overall {:.0}%", fraction * 100.0))
        .build();

    if dry_run {
        info!("Dry-run mode: commands are logged, not executed");
    }

    match installkit::with_panics_logged(|| plan.install()) {
        Ok(_) => {
            println!("✓ Plan '{}' installed", plan.name());
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}", failure_line(plan.name(), &e));
            Ok(false)
        }
    }
}

fn failure_line(plan: &str, err: &InstallError) -> String {
    format!("✗ Plan '{}' failed: {}", plan, err)
}

/// Main application entry point
fn main() -> Result<ExitCode> {
    init_logger();
    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    match cli.command {
        Commands::Validate { plan } => {
            let file = load(&plan)?;
            println!(
                "✓ Plan file is valid: '{}' ({} groups)",
                file.name,
                file.groups.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Plan { plan } => {
            let built = load(&plan)?.build_plan(cli.dry_run)?.build();
            println!("{}", built.summary());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { plan } => {
            if run(&plan, cli.dry_run)? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
