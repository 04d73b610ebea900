use std::path::PathBuf;

use thiserror::Error;

use crate::schedule::format_cycles;

/// The main error type for Stepfile operations
#[derive(Debug, Error)]
pub enum StepfileError {
    #[error("Stepfile not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Malformed annotation on line {line_number}: {line}")]
    MalformedAnnotation { line_number: usize, line: String },

    #[error("Command '{name}' on line {line_number} has no command text")]
    EmptyCommand { line_number: usize, name: String },

    #[error("Command '{command}' depends on '{dependency}' which was not found")]
    UnknownDependency { dependency: String, command: String },

    #[error(
        "Circular dependency detected among: {}{}",
        .remaining.join(", "),
        describe_cycles(.cycles)
    )]
    CircularDependency {
        remaining: Vec<String>,
        cycles: Vec<Vec<String>>,
    },

    #[error("Failed to tokenize command '{command}': {message}")]
    Tokenize { command: String, message: String },

    #[error("Failed to launch command '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dependency '{dependency}' of '{command}' was never scheduled")]
    InconsistentState { command: String, dependency: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Join(String),
}

/// Broad classification used by callers to pick an exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Configuration,
    Execution,
    Internal,
}

impl StepfileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StepfileError::NotFound(_) => ErrorCategory::NotFound,
            StepfileError::Yaml(_)
            | StepfileError::MalformedAnnotation { .. }
            | StepfileError::EmptyCommand { .. }
            | StepfileError::UnknownDependency { .. }
            | StepfileError::CircularDependency { .. }
            | StepfileError::Config(_) => ErrorCategory::Configuration,
            StepfileError::Tokenize { .. } | StepfileError::Launch { .. } => {
                ErrorCategory::Execution
            }
            StepfileError::Io(_)
            | StepfileError::InconsistentState { .. }
            | StepfileError::Join(_) => ErrorCategory::Internal,
        }
    }
}

fn describe_cycles(cycles: &[Vec<String>]) -> String {
    if cycles.is_empty() {
        return String::new();
    }
    format!(" (cycles: {})", format_cycles(cycles))
}

/// Result type alias for Stepfile operations
pub type StepfileResult<T> = Result<T, StepfileError>;
