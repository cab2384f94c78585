//! Tests for Script Execution and Error Handling
//!
//! These tests verify:
//! - ScriptOutput structure and methods
//! - Real command execution through ScriptAction
//! - Dry-run mode behavior
//! - Plan files driving script steps end to end

use installkit::actions::{run_script, CommandSpec, ScriptAction, ScriptArgs, ScriptOutput};
use installkit::{Action, InstallError, PlanFile};
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// ScriptOutput Tests
// =============================================================================

#[test]
fn test_script_output_signal_termination() {
    let output = ScriptOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: None, // Terminated by signal
        success: false,
        dry_run: false,
    };

    let err = output.ensure_success("migrate").unwrap_err();
    assert!(err.to_string().contains("exit code -1"));
}

#[test]
fn test_script_output_dry_run_success() {
    let output = ScriptOutput {
        stdout: "[DRY RUN] Skipped: cp\n".to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        success: true,
        dry_run: true,
    };

    assert!(output.ensure_success("cp").is_ok());
}

// =============================================================================
// Execution Tests
// =============================================================================

#[test]
fn test_successful_command_captures_stdout() {
    let spec = CommandSpec::new("sh", ["-c", "echo ready"]);
    let output = run_script(&spec, false).unwrap();

    assert!(output.success);
    assert_eq!(output.exit_code, Some(0));
    assert_eq!(output.stdout.trim(), "ready");
    assert!(!output.dry_run);
}

#[test]
fn test_env_vars_reach_the_child() {
    let spec = CommandSpec::new("sh", ["-c", "printf %s \"$INSTALL_STAGE\""]).env("INSTALL_STAGE", "seed");
    let output = run_script(&spec, false).unwrap();
    assert_eq!(output.stdout, "seed");
}

#[test]
fn test_working_dir_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = CommandSpec::new("sh", ["-c", "touch marker"]);
    spec.working_dir = Some(dir.path().to_path_buf());

    assert_eq!(spec.working_dir(), Some(dir.path()));
    run_script(&spec, false).unwrap();
    assert!(dir.path().join("marker").exists());
}

#[test]
fn test_non_zero_exit_fails_the_action() {
    let action = ScriptAction::new(
        "Restart services",
        CommandSpec::new("sh", ["-c", "echo 'unit not found' >&2; exit 3"]),
    )
    .unwrap();

    match action.execute().unwrap_err() {
        InstallError::ActionFailed { title, source } => {
            assert_eq!(title, "Restart services");
            let msg = source.to_string();
            assert!(msg.contains("exit code 3"), "got: {msg}");
            assert!(msg.contains("unit not found"), "got: {msg}");
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }
}

#[test]
fn test_missing_program_fails_the_action() {
    let action = ScriptAction::new(
        "Run vendor tool",
        CommandSpec::new("installkit-no-such-program-4242", Vec::<String>::new()),
    )
    .unwrap();

    let err = action.execute().unwrap_err();
    assert!(err.is_execution_failure());
    assert!(err.to_string().contains("Failed to spawn"));
}

#[test]
fn test_dry_run_action_succeeds_without_spawning() {
    let action = ScriptAction::new(
        "Wipe cache",
        CommandSpec::new("installkit-no-such-program-4242", ["--all"]),
    )
    .unwrap()
    .dry_run(true);

    let payload = action.execute().unwrap().expect("payload");
    assert_eq!(payload["dry_run"], serde_json::json!(true));
    assert_eq!(payload["exit_code"], serde_json::json!(0));
}

// =============================================================================
// Plan File End to End
// =============================================================================

fn plan_file(dir: &tempfile::TempDir) -> PlanFile {
    let out = dir.path().join("out.txt");
    let out = out.to_string_lossy();
    serde_json::from_value(serde_json::json!({
        "name": "e2e",
        "groups": [
            { "priority": 1, "name": "first", "steps": [
                { "priority": 1, "title": "write a", "program": "sh",
                  "args": ["-c", format!("echo a >> {out}")] },
                { "priority": 2, "title": "write b", "program": "sh",
                  "args": ["-c", format!("echo b >> {out}")] }
            ]},
            { "priority": 2, "name": "second", "steps": [
                { "priority": 1, "title": "break", "program": "sh", "args": ["-c", "exit 1"] },
                { "priority": 2, "title": "write c", "program": "sh",
                  "args": ["-c", format!("echo c >> {out}")] }
            ]}
        ]
    }))
    .unwrap()
}

#[test]
fn test_plan_file_halts_at_failing_step() {
    let dir = tempfile::tempdir().unwrap();
    let titles = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&titles);

    let mut plan = plan_file(&dir)
        .build_plan(false)
        .unwrap()
        .on_action_title(move |t| sink.borrow_mut().push(t.to_string()))
        .build();

    let err = plan.install().unwrap_err();
    assert_eq!(err.action_title(), Some("break"));
    assert_eq!(*titles.borrow(), vec!["write a", "write b", "break"]);

    let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(written, "a\nb\n");
}

#[test]
fn test_plan_file_dry_run_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut plan = plan_file(&dir).build_plan(true).unwrap().build();

    plan.install().unwrap();
    assert!(!dir.path().join("out.txt").exists());
}
