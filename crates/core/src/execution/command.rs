//! Command preparation and launch
//!
//! A [`PreparedCommand`] is a Stepfile command with variables expanded, its
//! text split into an argument vector and its environment overlay resolved.
//! It can then be run either blocking (sequential engine) or on the tokio
//! runtime (parallel engine) with the same semantics.

use std::collections::BTreeMap;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configs::stepfile::{StepCommand, StepfileConfig};
use crate::results::{CommandId, CommandOutcome};
use crate::types::{StepfileError, StepfileResult};
use crate::variables::expand_variables;

/// What happens to a child's stdout and stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Child writes straight to this process's streams
    #[default]
    Inherit,
    /// Streams are collected onto the [`CommandOutcome`]
    Capture,
    /// Streams go to the null device
    Discard,
}

/// A command ready to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    pub id: CommandId,
    /// Command text after variable expansion
    pub command_line: String,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl PreparedCommand {
    pub fn prepare(
        id: CommandId,
        command: &StepCommand,
        config: &StepfileConfig,
    ) -> StepfileResult<Self> {
        let command_line = expand_variables(&command.text, &config.variables);
        let mut argv = shell_words::split(&command_line).map_err(|e| StepfileError::Tokenize {
            command: command_line.clone(),
            message: e.to_string(),
        })?;

        if argv.is_empty() {
            return Err(StepfileError::Launch {
                command: command_line,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        }
        let program = argv.remove(0);

        Ok(Self {
            id,
            command_line,
            program,
            args: argv,
            env: config.shell_env.clone(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run and block until the child exits
    pub fn run_blocking(&self, output: OutputMode) -> StepfileResult<CommandOutcome> {
        let mut command = std::process::Command::new(&self.program);
        command.args(&self.args).envs(&self.env);

        let started = Instant::now();
        debug!("Launched: {} {}", self.program, self.args.join(" "));

        let result = match output {
            OutputMode::Capture => command.output().map(Captured::Output),
            OutputMode::Inherit => command.status().map(Captured::Status),
            OutputMode::Discard => command
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(Captured::Status),
        };

        self.finish(result, started)
    }

    /// Run on the tokio runtime
    pub async fn run_async(self, output: OutputMode) -> StepfileResult<CommandOutcome> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).envs(&self.env);

        let started = Instant::now();
        debug!("Launched: {} {}", self.program, self.args.join(" "));

        let result = match output {
            OutputMode::Capture => command.output().await.map(Captured::Output),
            OutputMode::Inherit => command.status().await.map(Captured::Status),
            OutputMode::Discard => command
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(Captured::Status),
        };

        self.finish(result, started)
    }

    fn finish(
        &self,
        result: std::io::Result<Captured>,
        started: Instant,
    ) -> StepfileResult<CommandOutcome> {
        let captured = result.map_err(|source| StepfileError::Launch {
            command: self.command_line.clone(),
            source,
        })?;

        let (status, stdout, stderr) = match captured {
            Captured::Status(status) => (status, None, None),
            Captured::Output(output) => (
                output.status,
                Some(String::from_utf8_lossy(&output.stdout).into_owned()),
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            ),
        };

        let exit_code = status.code().unwrap_or(-1);
        debug!("Finished: {} (exit code {})", self.id, exit_code);

        Ok(CommandOutcome {
            id: self.id.clone(),
            command_line: self.command_line.clone(),
            exit_code,
            duration: started.elapsed(),
            stdout,
            stderr,
        })
    }
}

enum Captured {
    Status(ExitStatus),
    Output(Output),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::stepfile::parse_stepfile;

    fn prepare_first(content: &str) -> StepfileResult<PreparedCommand> {
        let config = parse_stepfile(content).unwrap();
        let command = config.unnamed_commands()[0].clone();
        PreparedCommand::prepare(CommandId::Unnamed(0), &command, &config)
    }

    #[test]
    fn test_prepare_expands_and_splits() {
        let prepared = prepare_first("MSG = hello world\necho \"$MSG$\" 'a b' c\\ d\n").unwrap();
        assert_eq!(prepared.command_line, "echo \"hello world\" 'a b' c\\ d");
        assert_eq!(prepared.program(), "echo");
        assert_eq!(prepared.args(), ["hello world", "a b", "c d"]);
    }

    #[test]
    fn test_prepare_does_not_glob() {
        let prepared = prepare_first("ls *.rs\n").unwrap();
        assert_eq!(prepared.args(), ["*.rs"]);
    }

    #[test]
    fn test_unbalanced_quote_is_tokenize_error() {
        let err = prepare_first("echo \"oops\n").unwrap_err();
        assert!(matches!(err, StepfileError::Tokenize { .. }));
    }

    #[test]
    fn test_blank_command_is_launch_error() {
        let config = StepfileConfig::default();
        let command = StepCommand {
            name: Some("blank".to_string()),
            text: "   ".to_string(),
            depends_on: Vec::new(),
            groups: Default::default(),
            line_number: 1,
        };
        let err = PreparedCommand::prepare(CommandId::Named("blank".into()), &command, &config)
            .unwrap_err();
        assert!(matches!(err, StepfileError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_blocking_captures_output() {
        let prepared = prepare_first("MSG = hello\necho $MSG$\n").unwrap();
        let outcome = prepared.run_blocking(OutputMode::Capture).unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout.as_deref(), Some("hello\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_blocking_passes_shell_env() {
        let prepared = prepare_first("CUSTOM_VAR.sh = test_value\nprintenv CUSTOM_VAR\n").unwrap();
        let outcome = prepared.run_blocking(OutputMode::Capture).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout.as_deref(), Some("test_value\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_env_overrides_inherited_variable() {
        let prepared = prepare_first("HOME.sh = /overridden\nprintenv HOME\n").unwrap();
        let outcome = prepared.run_blocking(OutputMode::Capture).unwrap();
        assert!(outcome.success());
        assert_eq!(outcome.stdout.as_deref(), Some("/overridden\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async_shell_env_overrides_inherited_variable() {
        let prepared = prepare_first("HOME.sh = /elsewhere\nprintenv HOME\n").unwrap();
        let outcome = prepared.run_async(OutputMode::Capture).await.unwrap();
        assert_eq!(outcome.stdout.as_deref(), Some("/elsewhere\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_blocking_reports_exit_code() {
        let prepared = prepare_first("sh -c 'exit 3'\n").unwrap();
        let outcome = prepared.run_blocking(OutputMode::Discard).unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.stdout.is_none());
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let prepared = prepare_first("definitely-not-a-real-program-4242\n").unwrap();
        let err = prepared.run_blocking(OutputMode::Discard).unwrap_err();
        assert!(matches!(err, StepfileError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_async_captures_output() {
        let prepared = prepare_first("echo async\n").unwrap();
        let outcome = prepared.run_async(OutputMode::Capture).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.stdout.as_deref(), Some("async\n"));
    }
}
