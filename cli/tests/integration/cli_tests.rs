//! Integration tests for the CLI surface: help, version and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn bokchoi() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bokchoi"));
    cmd.env("NO_COLOR", "1").env_remove("BOKCHOI_CONFIG");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    bokchoi().assert().code(2).stderr(predicate::str::contains(
        "Run scripts and notebooks on spot instances",
    ));
}

#[test]
fn test_cli_help_lists_every_command() {
    let mut assert = bokchoi().arg("--help").assert().success();
    for command in [
        "init", "deploy", "undeploy", "run", "stop", "status", "logs", "connect", "forward",
        "version",
    ] {
        assert = assert.stdout(predicate::str::contains(command));
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    bokchoi()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bokchoi"));
}

#[test]
fn test_version_command_shows_version() {
    bokchoi()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!(
            "bokchoi ",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = bokchoi()
        .args(["version", "--json"])
        .output()
        .expect("run bokchoi");
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version --json prints JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

// --- Argument validation ---

#[test]
fn test_unknown_command_fails() {
    bokchoi()
        .arg("launch")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_forward_requires_host_and_key() {
    bokchoi()
        .args(["forward", "--local-port", "8888"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--host"));
}

#[test]
fn test_forward_rejects_non_numeric_port() {
    bokchoi()
        .args(["forward", "--local-port", "jupyter", "--host", "h", "--key", "k"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

// --- Missing configuration ---

#[test]
fn test_status_without_config_points_at_init() {
    let dir = tempfile::tempdir().expect("tempdir");
    bokchoi()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bokchoi init"));
}

#[test]
fn test_deploy_with_missing_config_file_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    bokchoi()
        .env("BOKCHOI_CONFIG", dir.path().join("nope.yaml"))
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn test_json_errors_are_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = bokchoi()
        .current_dir(dir.path())
        .args(["logs", "--json"])
        .output()
        .expect("run bokchoi");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("error document on stdout");
    assert_eq!(value["error"], true);
    assert!(
        value["message"]
            .as_str()
            .is_some_and(|m| m.contains("bokchoi init"))
    );
}
