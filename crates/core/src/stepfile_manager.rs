//! High-level Stepfile interface
//!
//! [`StepfileManager`] loads a Stepfile together with its optional
//! `stepfile.yml` settings, expands groups once, and exposes every operation
//! the CLI needs: listing, planning, inspecting and running.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stepfile_core::events::NoopReporter;
//! use stepfile_core::stepfile_manager::{StepfileManager, StepfileManagerConfig};
//! use std::path::PathBuf;
//!
//! # fn example() -> stepfile_core::types::StepfileResult<()> {
//! let manager = StepfileManager::new(StepfileManagerConfig {
//!     stepfile_path: PathBuf::from("Stepfile"),
//! })?;
//!
//! let plan = manager.plan()?;
//! println!("{} commands scheduled", plan.len());
//!
//! let report = manager.run(true, &NoopReporter)?;
//! assert!(report.succeeded());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::configs::settings::{load_runner_settings, RunnerSettings};
use crate::configs::stepfile::{load_stepfile, parse_stepfile, StepCommand, StepfileConfig};
use crate::events::Reporter;
use crate::execution::{ParallelRunner, RunOptions, SequentialRunner};
use crate::inspector::{inspect, GraphReport};
use crate::results::{CommandId, CommandInfo, CommandListResult, RunReport};
use crate::schedule::{schedule, ExecutionPlan};
use crate::types::StepfileResult;

/// Loaded Stepfile with groups already expanded
pub struct StepfileManager {
    pub stepfile_path: PathBuf,
    pub config: StepfileConfig,
    pub settings: RunnerSettings,
}

/// Configuration for initializing a Stepfile manager
pub struct StepfileManagerConfig {
    pub stepfile_path: PathBuf,
}

impl StepfileManager {
    /// Load the Stepfile and the settings file beside it
    pub fn new(config: StepfileManagerConfig) -> StepfileResult<Self> {
        let mut stepfile = load_stepfile(&config.stepfile_path)?;
        stepfile.expand_groups();
        let settings = load_runner_settings(&config.stepfile_path)?;

        Ok(Self {
            stepfile_path: config.stepfile_path,
            config: stepfile,
            settings,
        })
    }

    /// Build a manager from Stepfile text, with default settings
    pub fn from_source(content: &str) -> StepfileResult<Self> {
        let mut stepfile = parse_stepfile(content)?;
        stepfile.expand_groups();

        Ok(Self {
            stepfile_path: PathBuf::new(),
            config: stepfile,
            settings: RunnerSettings::default(),
        })
    }

    pub fn config(&self) -> &StepfileConfig {
        &self.config
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Validate dependencies and compute the execution order
    pub fn plan(&self) -> StepfileResult<ExecutionPlan> {
        schedule(&self.config)
    }

    /// Run sequentially with default output handling
    pub fn run(&self, stop_on_error: bool, reporter: &dyn Reporter) -> StepfileResult<RunReport> {
        self.run_with_options(
            RunOptions {
                stop_on_error,
                ..RunOptions::default()
            },
            reporter,
        )
    }

    pub fn run_with_options(
        &self,
        options: RunOptions,
        reporter: &dyn Reporter,
    ) -> StepfileResult<RunReport> {
        let plan = self.plan()?;
        SequentialRunner::new(&self.config, options, reporter).run(&plan)
    }

    /// Run independent named commands concurrently, at most `jobs` at a time
    pub async fn run_parallel(
        &self,
        options: RunOptions,
        jobs: usize,
        reporter: &dyn Reporter,
    ) -> StepfileResult<RunReport> {
        let plan = self.plan()?;
        ParallelRunner::new(&self.config, options, jobs, reporter)
            .run(&plan)
            .await
    }

    pub fn graph_report(&self) -> GraphReport {
        inspect(&self.config)
    }

    /// Text rendering of [`Self::graph_report`]
    pub fn visualize(&self) -> String {
        self.graph_report().to_string()
    }

    /// Declared commands, variables and shell environment
    pub fn list_commands(&self) -> CommandListResult {
        let named_commands = self
            .config
            .named_commands()
            .iter()
            .map(|command| command_info(CommandId::Named(command.label().to_string()), command))
            .collect();
        let unnamed_commands = self
            .config
            .unnamed_commands()
            .iter()
            .enumerate()
            .map(|(index, command)| command_info(CommandId::Unnamed(index), command))
            .collect();

        CommandListResult {
            named_commands,
            unnamed_commands,
            variables: self.config.variables.clone().into_iter().collect(),
            shell_env: self.config.shell_env.clone().into_iter().collect(),
        }
    }
}

fn command_info(id: CommandId, command: &StepCommand) -> CommandInfo {
    CommandInfo {
        id,
        text: command.text.clone(),
        depends_on: command.depends_on.clone(),
        groups: command.groups.iter().cloned().collect(),
        line_number: command.line_number,
    }
}
