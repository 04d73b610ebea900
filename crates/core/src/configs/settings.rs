use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::execution::command::OutputMode;
use crate::types::{StepfileError, StepfileResult};

/// File name of the optional settings file, looked up beside the Stepfile
pub const SETTINGS_FILE_NAME: &str = "stepfile.yml";

/// Runner defaults read from `stepfile.yml`
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnerSettings {
    pub stop_on_error: Option<bool>,
    pub parallel: Option<bool>,
    /// Maximum concurrent commands in parallel mode
    pub jobs: Option<usize>,
    pub output: Option<OutputMode>,
}

pub fn parse_runner_settings(yaml_str: &str) -> StepfileResult<RunnerSettings> {
    let settings: RunnerSettings = serde_yaml::from_str(yaml_str)?;
    if settings.jobs == Some(0) {
        return Err(StepfileError::Config("jobs must be at least 1".to_string()));
    }
    Ok(settings)
}

/// Path of the settings file that belongs to `stepfile_path`
pub fn settings_path_for(stepfile_path: &Path) -> PathBuf {
    stepfile_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SETTINGS_FILE_NAME)
}

/// Load settings beside the Stepfile, defaulting when the file is absent
pub fn load_runner_settings(stepfile_path: &Path) -> StepfileResult<RunnerSettings> {
    let path = settings_path_for(stepfile_path);
    if !path.exists() {
        return Ok(RunnerSettings::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        StepfileError::Config(format!("Failed to read settings {}: {}", path.display(), e))
    })?;

    parse_runner_settings(&content).map_err(|e| {
        StepfileError::Config(format!("Failed to parse settings {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let settings = parse_runner_settings(
            "stopOnError: false\nparallel: true\njobs: 4\noutput: capture\n",
        )
        .unwrap();

        assert_eq!(
            settings,
            RunnerSettings {
                stop_on_error: Some(false),
                parallel: Some(true),
                jobs: Some(4),
                output: Some(OutputMode::Capture),
            }
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(parse_runner_settings("retries: 3\n").is_err());
    }

    #[test]
    fn test_zero_jobs_is_rejected() {
        assert!(matches!(
            parse_runner_settings("jobs: 0\n"),
            Err(StepfileError::Config(_))
        ));
    }

    #[test]
    fn test_missing_settings_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_runner_settings(&dir.path().join("Stepfile")).unwrap();
        assert_eq!(settings, RunnerSettings::default());
    }

    #[test]
    fn test_settings_beside_stepfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE_NAME), "output: discard\n").unwrap();

        let settings = load_runner_settings(&dir.path().join("Stepfile")).unwrap();
        assert_eq!(settings.output, Some(OutputMode::Discard));
        assert_eq!(settings.stop_on_error, None);
    }

    #[test]
    fn test_settings_path_for_bare_file_name() {
        assert_eq!(
            settings_path_for(Path::new("Stepfile")),
            Path::new("").join(SETTINGS_FILE_NAME)
        );
    }
}
