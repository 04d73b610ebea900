use std::time::Duration;

use anyhow::{bail, Result};
use colored::*;
use stepfile_core::colors::label_color;
use stepfile_core::configs::settings::RunnerSettings;
use stepfile_core::events::{Reporter, RunEvent};
use stepfile_core::execution::{OutputMode, RunOptions};
use stepfile_core::results::{CommandId, CommandOutcome, RunReport};
use stepfile_core::StepfileManager;
use tracing::debug;

use crate::RunArgs;

/// Prints run progress to the terminal
struct TerminalReporter;

fn label(id: &CommandId) -> ColoredString {
    let text = id.to_string();
    text.color(label_color(&text)).bold()
}

fn seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

impl Reporter for TerminalReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { total, parallel } => {
                let mode = if *parallel { "in parallel" } else { "sequentially" };
                println!("{} {} commands {}", "Running".bold(), total, mode);
                println!();
            }
            RunEvent::CommandStarted { id, command_line } => {
                println!("{} {} {}", "▶".cyan(), label(id), command_line.dimmed());
            }
            RunEvent::CommandFinished {
                id,
                exit_code,
                duration,
            } => {
                if *exit_code == 0 {
                    println!(
                        "{} {} {}",
                        "✓".green().bold(),
                        label(id),
                        seconds(*duration).dimmed()
                    );
                } else {
                    println!(
                        "{} {} {}",
                        "✗".red().bold(),
                        label(id),
                        format!("exited with code {}", exit_code).red()
                    );
                }
            }
            RunEvent::CommandSkipped {
                id,
                failed_dependency,
            } => {
                println!(
                    "{} {} {}",
                    "⊘".yellow(),
                    label(id),
                    format!("skipped, dependency '{}' did not succeed", failed_dependency).yellow()
                );
            }
            RunEvent::RunHalted { reason } => {
                println!("{} {}", "Stopping:".red().bold(), reason);
            }
            RunEvent::RunFinished {
                succeeded,
                failed,
                skipped,
            } => {
                println!();
                println!(
                    "{} {} succeeded, {} failed, {} skipped",
                    "Summary:".bold(),
                    succeeded.to_string().green(),
                    failed.to_string().red(),
                    skipped.to_string().yellow()
                );
            }
        }
    }
}

/// Effective run configuration: flags over `stepfile.yml` over defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    options: RunOptions,
    parallel: bool,
    jobs: usize,
}

fn resolve(args: &RunArgs, settings: &RunnerSettings) -> Resolved {
    let stop_on_error = if args.stop_on_error {
        true
    } else if args.keep_going {
        false
    } else {
        settings.stop_on_error.unwrap_or(true)
    };
    let output = args
        .output
        .map(OutputMode::from)
        .or(settings.output)
        .unwrap_or_default();
    let jobs = args.jobs.or(settings.jobs).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
    });

    let resolved = Resolved {
        options: RunOptions {
            stop_on_error,
            output,
        },
        parallel: args.parallel || settings.parallel.unwrap_or(false),
        jobs,
    };
    debug!("Resolved run configuration: {:?}", resolved);
    resolved
}

fn print_captured(outcome: &CommandOutcome) {
    let prefix = format!("[{}]", outcome.id).color(label_color(&outcome.id.to_string()));
    let streams = [outcome.stdout.as_deref(), outcome.stderr.as_deref()];
    for text in streams.into_iter().flatten() {
        for line in text.lines() {
            println!("{} {}", prefix, line);
        }
    }
}

fn failure_count(report: &RunReport) -> usize {
    report.failures().count() + report.skipped.len()
}

pub async fn execute(manager: &StepfileManager, args: &RunArgs) -> Result<()> {
    let resolved = resolve(args, manager.settings());
    let reporter = TerminalReporter;

    let report = if resolved.parallel {
        manager
            .run_parallel(resolved.options, resolved.jobs, &reporter)
            .await?
    } else {
        manager.run_with_options(resolved.options, &reporter)?
    };

    if resolved.options.output == OutputMode::Capture {
        println!();
        for outcome in report.results().iter().chain(report.unnamed.iter()) {
            print_captured(outcome);
        }
    }

    if report.succeeded() {
        println!(
            "{} {}",
            "✓".green().bold(),
            "All commands completed successfully!".green().bold()
        );
        return Ok(());
    }

    bail!("{} commands failed or were skipped", failure_count(&report))
}
