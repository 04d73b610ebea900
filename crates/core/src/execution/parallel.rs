//! Parallel Stepfile runner
//!
//! Named commands start as soon as all of their dependencies have succeeded,
//! with at most `jobs` children alive at once. Each settled command releases
//! its dependents; among released commands the earliest in schedule order is
//! dispatched first. Unnamed commands still run one at a time after every
//! named command has settled.

use std::collections::{BTreeSet, HashMap, HashSet};

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::configs::stepfile::StepfileConfig;
use crate::events::{Reporter, RunEvent};
use crate::execution::command::PreparedCommand;
use crate::execution::runner::{
    blocking_dependency, finish_run, resolve_command, state_of, DependencyState, RunOptions,
};
use crate::results::{CommandId, CommandOutcome, HaltReason, RunReport, SkippedCommand};
use crate::schedule::ExecutionPlan;
use crate::types::{StepfileError, StepfileResult};

/// Bookkeeping for named commands that have not settled yet
struct Pending {
    /// Unsettled dependency count, by schedule position
    remaining: Vec<usize>,
    /// Dependents of each name, as schedule positions
    dependents: HashMap<String, Vec<usize>>,
    /// Positions whose dependencies have all settled
    ready: BTreeSet<usize>,
}

impl Pending {
    fn new(config: &StepfileConfig, named: &[&str]) -> Self {
        let mut remaining = vec![0; named.len()];
        let mut dependents: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, name) in named.iter().enumerate() {
            let Some(command) = config.named_command(name) else {
                continue;
            };
            let distinct: HashSet<&str> = command.depends_on.iter().map(String::as_str).collect();
            remaining[position] = distinct.len();
            for dep in distinct {
                dependents.entry(dep.to_string()).or_default().push(position);
            }
        }

        let ready = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(position, _)| position)
            .collect();

        Self {
            remaining,
            dependents,
            ready,
        }
    }

    fn settle(&mut self, name: &str) {
        let Some(dependents) = self.dependents.get(name) else {
            return;
        };
        for &position in dependents {
            let count = &mut self.remaining[position];
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.ready.insert(position);
            }
        }
    }
}

/// Runs independent named commands concurrently
pub struct ParallelRunner<'a> {
    config: &'a StepfileConfig,
    options: RunOptions,
    jobs: usize,
    reporter: &'a dyn Reporter,
}

impl<'a> ParallelRunner<'a> {
    pub fn new(
        config: &'a StepfileConfig,
        options: RunOptions,
        jobs: usize,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            options,
            jobs: jobs.max(1),
            reporter,
        }
    }

    pub async fn run(&self, plan: &ExecutionPlan) -> StepfileResult<RunReport> {
        let mut report = RunReport::new(plan.order().to_vec());
        let mut states: HashMap<String, DependencyState> = HashMap::new();

        let named: Vec<&str> = plan.named().collect();
        let mut pending = Pending::new(self.config, &named);
        let mut workers: JoinSet<StepfileResult<CommandOutcome>> = JoinSet::new();

        info!("Running {} commands with up to {} jobs", plan.len(), self.jobs);
        self.reporter.report(&RunEvent::RunStarted {
            total: plan.len(),
            parallel: true,
        });

        loop {
            while report.halted.is_none() && workers.len() < self.jobs {
                let Some(position) = pending.ready.pop_first() else {
                    break;
                };
                let id = CommandId::Named(named[position].to_string());
                let command = resolve_command(self.config, &id)?;

                if let Some(dependency) = blocking_dependency(command, &states)? {
                    let dependency = dependency.to_string();
                    states.insert(named[position].to_string(), DependencyState::Skipped);
                    self.skip(&mut report, &id, dependency);
                    pending.settle(named[position]);
                    continue;
                }

                let prepared = match PreparedCommand::prepare(id.clone(), command, self.config) {
                    Ok(prepared) => prepared,
                    Err(err) => return Err(drain(&mut workers, err).await),
                };
                self.reporter.report(&RunEvent::CommandStarted {
                    id,
                    command_line: prepared.command_line.clone(),
                });
                workers.spawn(prepared.run_async(self.options.output));
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => return Err(drain(&mut workers, err).await),
                Err(join_err) => {
                    let err = StepfileError::Join(join_err.to_string());
                    return Err(drain(&mut workers, err).await);
                }
            };

            self.reporter.report(&RunEvent::CommandFinished {
                id: outcome.id.clone(),
                exit_code: outcome.exit_code,
                duration: outcome.duration,
            });

            let id = outcome.id.clone();
            let exit_code = outcome.exit_code;
            if let Some(name) = id.name() {
                states.insert(name.to_string(), state_of(&outcome));
                pending.settle(name);
            }
            report.record(outcome);

            if exit_code != 0 && self.options.stop_on_error && report.halted.is_none() {
                self.halt(&mut report, HaltReason::CommandFailed { id, exit_code });
            }
        }

        if report.halted.is_none() {
            self.run_unnamed(plan, &states, &mut report).await?;
        }

        report.sort_by_order();
        finish_run(&report, self.reporter);
        Ok(report)
    }

    async fn run_unnamed(
        &self,
        plan: &ExecutionPlan,
        states: &HashMap<String, DependencyState>,
        report: &mut RunReport,
    ) -> StepfileResult<()> {
        for id in plan.order().iter().filter(|id| id.name().is_none()) {
            let command = resolve_command(self.config, id)?;

            if let Some(dependency) = blocking_dependency(command, states)? {
                self.skip(report, id, dependency.to_string());
                if report.halted.is_some() {
                    break;
                }
                continue;
            }

            let prepared = PreparedCommand::prepare(id.clone(), command, self.config)?;
            self.reporter.report(&RunEvent::CommandStarted {
                id: id.clone(),
                command_line: prepared.command_line.clone(),
            });
            let outcome = prepared.run_async(self.options.output).await?;
            self.reporter.report(&RunEvent::CommandFinished {
                id: id.clone(),
                exit_code: outcome.exit_code,
                duration: outcome.duration,
            });

            let exit_code = outcome.exit_code;
            report.record(outcome);
            if exit_code != 0 && self.options.stop_on_error {
                self.halt(
                    report,
                    HaltReason::CommandFailed {
                        id: id.clone(),
                        exit_code,
                    },
                );
                break;
            }
        }
        Ok(())
    }

    fn skip(&self, report: &mut RunReport, id: &CommandId, dependency: String) {
        self.reporter.report(&RunEvent::CommandSkipped {
            id: id.clone(),
            failed_dependency: dependency.clone(),
        });
        report.skipped.push(SkippedCommand {
            id: id.clone(),
            failed_dependency: dependency.clone(),
        });

        if self.options.stop_on_error && report.halted.is_none() {
            self.halt(
                report,
                HaltReason::DependencyFailed {
                    id: id.clone(),
                    dependency,
                },
            );
        }
    }

    fn halt(&self, report: &mut RunReport, reason: HaltReason) {
        info!("Halting run, waiting for running commands: {}", reason);
        self.reporter.report(&RunEvent::RunHalted {
            reason: reason.clone(),
        });
        report.halted = Some(reason);
    }
}

/// Wait for every in-flight child before surfacing a fatal error
async fn drain(
    workers: &mut JoinSet<StepfileResult<CommandOutcome>>,
    err: StepfileError,
) -> StepfileError {
    if !workers.is_empty() {
        warn!("Waiting for {} running commands after error: {}", workers.len(), err);
    }
    while workers.join_next().await.is_some() {}
    err
}
