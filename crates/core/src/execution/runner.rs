//! Sequential Stepfile runner
//!
//! Walks an [`ExecutionPlan`] one command at a time. A command only launches
//! once every dependency has exited zero; the previous child has always
//! terminated before the next one starts.

use std::collections::HashMap;

use tracing::info;

use crate::configs::stepfile::{StepCommand, StepfileConfig};
use crate::events::{Reporter, RunEvent};
use crate::execution::command::{OutputMode, PreparedCommand};
use crate::results::{CommandId, CommandOutcome, HaltReason, RunReport, SkippedCommand};
use crate::schedule::ExecutionPlan;
use crate::types::{StepfileError, StepfileResult};

/// Options shared by the sequential and parallel runners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Halt at the first failed command or failed dependency
    pub stop_on_error: bool,
    pub output: OutputMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            output: OutputMode::Inherit,
        }
    }
}

/// Settled state of a named command, as seen by its dependents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DependencyState {
    Succeeded,
    Failed,
    Skipped,
}

/// Check a command's dependencies against the settled states.
///
/// Returns the first dependency that did not succeed. A dependency that has
/// not settled at all means the order was not topological.
pub(crate) fn blocking_dependency<'c>(
    command: &'c StepCommand,
    states: &HashMap<String, DependencyState>,
) -> StepfileResult<Option<&'c str>> {
    for dep in &command.depends_on {
        match states.get(dep) {
            Some(DependencyState::Succeeded) => {}
            Some(DependencyState::Failed | DependencyState::Skipped) => return Ok(Some(dep)),
            None => {
                return Err(StepfileError::InconsistentState {
                    command: command.label().to_string(),
                    dependency: dep.clone(),
                })
            }
        }
    }
    Ok(None)
}

pub(crate) fn resolve_command<'c>(
    config: &'c StepfileConfig,
    id: &CommandId,
) -> StepfileResult<&'c StepCommand> {
    config
        .command(id)
        .ok_or_else(|| StepfileError::Config(format!("Command '{}' is not declared", id)))
}

pub(crate) fn state_of(outcome: &CommandOutcome) -> DependencyState {
    if outcome.success() {
        DependencyState::Succeeded
    } else {
        DependencyState::Failed
    }
}

/// Emit the closing event and log a summary
pub(crate) fn finish_run(report: &RunReport, reporter: &dyn Reporter) {
    let failed = report.failures().count();
    let launched = report.results().len() + report.unnamed.len();
    let succeeded = launched - failed;

    info!(
        "Run finished: {} succeeded, {} failed, {} skipped",
        succeeded,
        failed,
        report.skipped.len()
    );
    reporter.report(&RunEvent::RunFinished {
        succeeded,
        failed,
        skipped: report.skipped.len(),
    });
}

/// Runs the commands of a Stepfile strictly one after another
pub struct SequentialRunner<'a> {
    config: &'a StepfileConfig,
    options: RunOptions,
    reporter: &'a dyn Reporter,
}

impl<'a> SequentialRunner<'a> {
    pub fn new(
        config: &'a StepfileConfig,
        options: RunOptions,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            options,
            reporter,
        }
    }

    /// Execute every command of the plan in order
    pub fn run(&self, plan: &ExecutionPlan) -> StepfileResult<RunReport> {
        let mut report = RunReport::new(plan.order().to_vec());
        let mut states: HashMap<String, DependencyState> = HashMap::new();

        info!("Running {} commands sequentially", plan.len());
        self.reporter.report(&RunEvent::RunStarted {
            total: plan.len(),
            parallel: false,
        });

        for id in plan.order() {
            let command = resolve_command(self.config, id)?;

            if let Some(dependency) = blocking_dependency(command, &states)? {
                let dependency = dependency.to_string();
                if let Some(name) = id.name() {
                    states.insert(name.to_string(), DependencyState::Skipped);
                }
                self.reporter.report(&RunEvent::CommandSkipped {
                    id: id.clone(),
                    failed_dependency: dependency.clone(),
                });
                report.skipped.push(SkippedCommand {
                    id: id.clone(),
                    failed_dependency: dependency.clone(),
                });

                if self.options.stop_on_error {
                    self.halt(
                        &mut report,
                        HaltReason::DependencyFailed {
                            id: id.clone(),
                            dependency,
                        },
                    );
                    break;
                }
                continue;
            }

            let outcome = self.launch(id, command)?;
            let exit_code = outcome.exit_code;
            if let Some(name) = id.name() {
                states.insert(name.to_string(), state_of(&outcome));
            }
            report.record(outcome);

            if exit_code != 0 && self.options.stop_on_error {
                self.halt(
                    &mut report,
                    HaltReason::CommandFailed {
                        id: id.clone(),
                        exit_code,
                    },
                );
                break;
            }
        }

        finish_run(&report, self.reporter);
        Ok(report)
    }

    fn launch(&self, id: &CommandId, command: &StepCommand) -> StepfileResult<CommandOutcome> {
        let prepared = PreparedCommand::prepare(id.clone(), command, self.config)?;
        self.reporter.report(&RunEvent::CommandStarted {
            id: id.clone(),
            command_line: prepared.command_line.clone(),
        });

        let outcome = prepared.run_blocking(self.options.output)?;
        self.reporter.report(&RunEvent::CommandFinished {
            id: id.clone(),
            exit_code: outcome.exit_code,
            duration: outcome.duration,
        });
        Ok(outcome)
    }

    fn halt(&self, report: &mut RunReport, reason: HaltReason) {
        info!("Halting run: {}", reason);
        self.reporter.report(&RunEvent::RunHalted {
            reason: reason.clone(),
        });
        report.halted = Some(reason);
    }
}
