use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use stepfile_core::execution::OutputMode;
use stepfile_core::{ErrorCategory, StepfileError, StepfileManager, StepfileManagerConfig};
use tracing_subscriber::EnvFilter;

mod commands;

/// Step - A dependency-aware command runner
#[derive(Parser)]
#[command(name = "step")]
#[command(about = "Run the commands of a Stepfile in dependency order")]
#[command(version)]
struct Cli {
    /// Path to the Stepfile
    #[arg(short, long, env = "STEPFILE", default_value = "Stepfile", global = true)]
    file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every command in dependency order
    Run(RunArgs),
    /// Show the execution order without running anything
    Plan,
    /// Show the command dependency graph
    Graph,
    /// List commands, variables and shell environment
    List,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Keep running unrelated commands after a failure
    #[arg(long, conflicts_with = "stop_on_error")]
    pub keep_going: bool,

    /// Halt at the first failure, even when stepfile.yml says otherwise
    #[arg(long)]
    pub stop_on_error: bool,

    /// Run independent named commands concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Maximum concurrent commands in parallel mode
    #[arg(short, long, value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// What to do with command output
    #[arg(long, value_enum)]
    pub output: Option<OutputArg>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Inherit,
    Capture,
    Discard,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Inherit => OutputMode::Inherit,
            OutputArg::Capture => OutputMode::Capture,
            OutputArg::Discard => OutputMode::Discard,
        }
    }
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(jobs) => Ok(jobs),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit status for a failed invocation
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<StepfileError>().map(StepfileError::category) {
        Some(ErrorCategory::NotFound) => 100,
        Some(ErrorCategory::Configuration) => 2,
        _ => 1,
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let manager = StepfileManager::new(StepfileManagerConfig {
        stepfile_path: cli.file.clone(),
    })
    .with_context(|| format!("Failed to load {}", cli.file.display()))?;

    // CLI layer only handles presentation
    match cli.command {
        Commands::Run(args) => commands::run::execute(&manager, &args).await,
        Commands::Plan => commands::plan::execute(&manager),
        Commands::Graph => commands::graph::execute(&manager),
        Commands::List => commands::list::execute(&manager),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}
