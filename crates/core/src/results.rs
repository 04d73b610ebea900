//! Result types for Stepfile runs
//!
//! Execution never mutates the parsed commands. Every launched command yields
//! an immutable [`CommandOutcome`] and the engine collects them into a
//! [`RunReport`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Identity of a command within one Stepfile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandId {
    Named(String),
    /// Position among unnamed commands, in file order
    Unnamed(usize),
}

impl CommandId {
    pub fn name(&self) -> Option<&str> {
        match self {
            CommandId::Named(name) => Some(name),
            CommandId::Unnamed(_) => None,
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandId::Named(name) => write!(f, "{}", name),
            CommandId::Unnamed(index) => write!(f, "#{}", index + 1),
        }
    }
}

/// Final state of a command that was launched and ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub id: CommandId,
    /// Command line after variable expansion
    pub command_line: String,
    /// Exit code, `-1` when the process was terminated by a signal
    pub exit_code: i32,
    pub duration: Duration,
    /// Captured output, only populated in capture mode
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A command that was not launched because a dependency did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCommand {
    pub id: CommandId,
    pub failed_dependency: String,
}

/// Why a run stopped before reaching the end of its order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    CommandFailed { id: CommandId, exit_code: i32 },
    DependencyFailed { id: CommandId, dependency: String },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::CommandFailed { id, exit_code } => {
                write!(f, "command '{}' exited with code {}", id, exit_code)
            }
            HaltReason::DependencyFailed { id, dependency } => {
                write!(f, "command '{}' depends on failed '{}'", id, dependency)
            }
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Scheduled order, including commands that never ran
    pub order: Vec<CommandId>,
    results: Vec<CommandOutcome>,
    index: HashMap<String, usize>,
    /// Outcomes of unnamed commands, in the order they ran
    pub unnamed: Vec<CommandOutcome>,
    pub skipped: Vec<SkippedCommand>,
    pub halted: Option<HaltReason>,
}

impl RunReport {
    pub fn new(order: Vec<CommandId>) -> Self {
        Self {
            order,
            ..Self::default()
        }
    }

    /// Store an outcome. Named outcomes become addressable by name.
    pub fn record(&mut self, outcome: CommandOutcome) {
        match &outcome.id {
            CommandId::Named(name) => {
                self.index.insert(name.clone(), self.results.len());
                self.results.push(outcome);
            }
            CommandId::Unnamed(_) => self.unnamed.push(outcome),
        }
    }

    /// Named outcomes in the order they were recorded
    pub fn results(&self) -> &[CommandOutcome] {
        &self.results
    }

    pub fn get(&self, name: &str) -> Option<&CommandOutcome> {
        self.index.get(name).map(|&i| &self.results[i])
    }

    pub fn exit_code(&self, name: &str) -> Option<i32> {
        self.get(name).map(|outcome| outcome.exit_code)
    }

    /// Every launched command, named and unnamed, that exited non-zero
    pub fn failures(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.results
            .iter()
            .chain(self.unnamed.iter())
            .filter(|outcome| !outcome.success())
    }

    /// True when every scheduled command ran and exited zero
    pub fn succeeded(&self) -> bool {
        self.halted.is_none() && self.skipped.is_empty() && self.failures().next().is_none()
    }

    /// Reorder named and unnamed outcomes to follow the scheduled order
    pub(crate) fn sort_by_order(&mut self) {
        let position: HashMap<&CommandId, usize> =
            self.order.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let key = |outcome: &CommandOutcome| {
            position
                .get(&outcome.id)
                .copied()
                .unwrap_or(usize::MAX)
        };

        self.results.sort_by_key(key);
        self.unnamed.sort_by_key(key);
        self.skipped
            .sort_by_key(|skipped| position.get(&skipped.id).copied().unwrap_or(usize::MAX));
        self.index = self
            .results
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| outcome.id.name().map(|name| (name.to_string(), i)))
            .collect();
    }
}

/// Summary of one declared command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub id: CommandId,
    pub text: String,
    pub depends_on: Vec<String>,
    pub groups: Vec<String>,
    pub line_number: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandListResult {
    pub named_commands: Vec<CommandInfo>,
    pub unnamed_commands: Vec<CommandInfo>,
    pub variables: Vec<(String, String)>,
    pub shell_env: Vec<(String, String)>,
}
