use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// installkit - run ordered installer plans
#[derive(Parser, Debug)]
#[command(name = "installkit")]
#[command(about = "Run ordered, halt-on-failure installer plans")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log each command instead of executing it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a plan file without running it
    Validate {
        /// Path to the plan file
        plan: PathBuf,
    },
    /// Print the groups and steps of a plan in execution order
    Plan {
        /// Path to the plan file
        plan: PathBuf,
    },
    /// Run a plan, stopping at the first failing step
    Run {
        /// Path to the plan file
        plan: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
