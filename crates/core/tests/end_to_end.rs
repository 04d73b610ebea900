//! End-to-end runs of on-disk Stepfiles

#![cfg(unix)]

use std::fs;
use std::path::PathBuf;

use stepfile_core::events::{NoopReporter, RecordingReporter, RunEvent};
use stepfile_core::execution::{OutputMode, RunOptions};
use stepfile_core::results::CommandId;
use stepfile_core::{ErrorCategory, StepfileError, StepfileManager, StepfileManagerConfig};
use tempfile::TempDir;

fn load(stepfile: &str) -> (TempDir, StepfileManager) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Stepfile");
    fs::write(&path, stepfile).unwrap();

    let manager = StepfileManager::new(StepfileManagerConfig {
        stepfile_path: path,
    })
    .unwrap();
    (dir, manager)
}

fn quiet(stop_on_error: bool) -> RunOptions {
    RunOptions {
        stop_on_error,
        output: OutputMode::Capture,
    }
}

fn order(manager: &StepfileManager) -> Vec<String> {
    manager
        .plan()
        .unwrap()
        .order()
        .iter()
        .map(|id| id.to_string())
        .collect()
}

#[test]
fn test_linear_dependency_runs_both() {
    let (_dir, manager) = load("A = echo a\n@depends(A) B = echo b\n");

    assert_eq!(order(&manager), vec!["A", "B"]);

    let report = manager.run_with_options(quiet(true), &NoopReporter).unwrap();
    assert_eq!(report.exit_code("A"), Some(0));
    assert_eq!(report.exit_code("B"), Some(0));
    assert_eq!(report.results().len(), 2);
    assert!(report.succeeded());
}

#[test]
fn test_group_members_run_before_dependent() {
    let (_dir, manager) = load(
        "@group(g1) X = true
@group(g1) Y = true
@depends_group(g1) Z = echo z
",
    );

    let z = manager.config().named_command("Z").unwrap();
    assert_eq!(z.depends_on, vec!["X", "Y"]);
    assert_eq!(order(&manager), vec!["X", "Y", "Z"]);

    let report = manager.run_with_options(quiet(true), &NoopReporter).unwrap();
    assert!(report.succeeded());
}

#[test]
fn test_unknown_dependency_launches_nothing() {
    let (_dir, manager) = load("@depends(M) N = echo n\n");
    assert!(manager.config().contains_command("N"));

    let reporter = RecordingReporter::new();
    let err = manager.run(true, &reporter).unwrap_err();

    assert!(matches!(
        err,
        StepfileError::UnknownDependency { ref dependency, ref command }
            if dependency == "M" && command == "N"
    ));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(reporter.started().is_empty());
}

#[test]
fn test_failing_dependency_halts_run() {
    let (_dir, manager) = load("A = false\n@depends(A) B = echo b\n");

    let reporter = RecordingReporter::new();
    let report = manager.run_with_options(quiet(true), &reporter).unwrap();

    assert_eq!(report.exit_code("A"), Some(1));
    assert_eq!(report.get("B"), None);
    assert_eq!(report.results().len(), 1);
    assert!(report.halted.is_some());
    assert_eq!(reporter.started(), vec![CommandId::Named("A".to_string())]);
}

#[test]
fn test_cycle_launches_nothing() {
    let (_dir, manager) = load("@depends(b) a = true\n@depends(a) b = true\necho free\n");

    let reporter = RecordingReporter::new();
    match manager.run(false, &reporter) {
        Err(StepfileError::CircularDependency { remaining, .. }) => {
            assert_eq!(remaining, vec!["a", "b"]);
        }
        other => panic!("expected a cycle error, got {:?}", other.map(|r| r.order)),
    }
    assert!(reporter.events().is_empty());
}

#[test]
fn test_keep_going_skips_only_dependents() {
    let (_dir, manager) = load(
        "build = false
@depends(build) package = echo package
lint = echo lint
echo done
",
    );

    let report = manager.run_with_options(quiet(false), &NoopReporter).unwrap();

    assert_eq!(report.exit_code("build"), Some(1));
    assert_eq!(report.exit_code("lint"), Some(0));
    assert_eq!(report.get("package"), None);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].failed_dependency, "build");
    assert_eq!(report.unnamed.len(), 1);
    assert_eq!(report.unnamed[0].stdout.as_deref(), Some("done\n"));
}

#[test]
fn test_variables_and_shell_env_reach_commands() {
    let (_dir, manager) = load(
        "GREETING = hello
TARGET.sh = world
@depends(first) sh -c 'echo $GREETING$ $TARGET'
first = true
",
    );

    let report = manager.run_with_options(quiet(true), &NoopReporter).unwrap();
    assert_eq!(report.unnamed[0].command_line, "sh -c 'echo hello $TARGET'");
    assert_eq!(report.unnamed[0].stdout.as_deref(), Some("hello world\n"));
}

#[test]
fn test_shell_env_replaces_inherited_value() {
    let (_dir, manager) = load("HOME.sh = /overridden\nprintenv HOME\n");

    let report = manager.run_with_options(quiet(true), &NoopReporter).unwrap();
    assert_eq!(report.unnamed[0].stdout.as_deref(), Some("/overridden\n"));
}

#[test]
fn test_missing_executable_is_launch_error() {
    let (_dir, manager) = load("broken = step-test-no-such-binary --flag\n");

    let err = manager.run(true, &NoopReporter).unwrap_err();
    assert!(matches!(err, StepfileError::Launch { .. }));
    assert_eq!(err.category(), ErrorCategory::Execution);
}

#[test]
fn test_missing_file_is_not_found() {
    let err = StepfileManager::new(StepfileManagerConfig {
        stepfile_path: PathBuf::from("definitely/not/here/Stepfile"),
    })
    .err()
    .unwrap();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_parallel_matches_sequential_results() {
    let content = "a = echo a
b = echo b
@depends(a, b) c = echo c
@depends(c) d = false
@depends(d) e = echo e
echo tail
";
    let (_dir, manager) = load(content);

    let sequential = manager.run_with_options(quiet(false), &NoopReporter).unwrap();
    let reporter = RecordingReporter::new();
    let parallel = manager.run_parallel(quiet(false), 4, &reporter).await.unwrap();

    let codes = |report: &stepfile_core::results::RunReport| -> Vec<(String, i32)> {
        report
            .results()
            .iter()
            .map(|o| (o.id.to_string(), o.exit_code))
            .collect()
    };
    assert_eq!(codes(&sequential), codes(&parallel));
    assert_eq!(sequential.skipped, parallel.skipped);
    assert_eq!(parallel.unnamed.len(), 1);
    assert!(matches!(
        reporter.events().first(),
        Some(RunEvent::RunStarted { total: 6, parallel: true })
    ));
}
