//! Integration tests for `bokchoi init`.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn bokchoi_in(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bokchoi"));
    cmd.env("NO_COLOR", "1")
        .env_remove("BOKCHOI_CONFIG")
        .current_dir(dir);
    cmd
}

#[test]
fn test_init_writes_starter_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    bokchoi_in(dir.path())
        .args(["init", "--project", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bokchoi.yaml"));

    let content =
        std::fs::read_to_string(dir.path().join("bokchoi.yaml")).expect("config written");
    assert!(content.contains("project: demo"));
}

#[test]
fn test_init_keeps_existing_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bokchoi.yaml");
    std::fs::write(&path, "project: mine\n").expect("seed config");

    bokchoi_in(dir.path())
        .args(["init", "--project", "demo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(
        std::fs::read_to_string(&path).expect("config kept"),
        "project: mine\n"
    );
}

#[test]
fn test_init_rejects_invalid_project_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    bokchoi_in(dir.path())
        .args(["init", "--project", "Not Valid"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid project name"));
    assert!(!dir.path().join("bokchoi.yaml").exists());
}

#[test]
fn test_init_json_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = bokchoi_in(dir.path())
        .args(["--json", "init", "--project", "demo"])
        .output()
        .expect("run bokchoi");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["project"], "demo");
    assert_eq!(value["created"], true);
}

#[test]
fn test_explicit_config_flag_is_honored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("conf/custom.yaml");
    bokchoi_in(dir.path())
        .arg("--config")
        .arg(&path)
        .args(["init", "--project", "demo"])
        .assert()
        .success();
    assert!(path.exists());
}
