//! Integration tests for the cfgsync binary.
//!
//! These exercise the compiled binary using assert_cmd. None of them reach
//! a real tenant: every command either works offline or fails before the
//! first request.

use assert_cmd::Command;
use cfgsync_test_utils::workspace::TestWorkspace;
use predicates::prelude::*;
use serde_json::Value;

/// A cfgsync command isolated from the developer's environment
fn cfgsync_cmd(home: &TestWorkspace) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cfgsync"));
    cmd.env("HOME", home.root())
        .env("XDG_CONFIG_HOME", home.path(".config"))
        .env_remove("CFGSYNC_TEST_TOKEN")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn initialized() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.init_cfgsync("prod", "https://prod.example.com/api/v1");
    ws
}

// ============================================================================
// Help and Version
// ============================================================================

#[test]
fn test_help_output() {
    let home = TestWorkspace::new();
    cfgsync_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirror, diff, push"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn test_version_output() {
    let home = TestWorkspace::new();
    cfgsync_cmd(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cfgsync"));
}

#[test]
fn test_no_command_shows_help_hint() {
    let home = TestWorkspace::new();
    cfgsync_cmd(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("cfgsync --help"));
}

#[test]
fn test_unknown_command_fails() {
    let home = TestWorkspace::new();
    cfgsync_cmd(&home).arg("sync-everything").assert().failure();
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_config() {
    let ws = TestWorkspace::new();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .args(["init", "--tenant", "prod", "--base-url", "https://prod.example.com/api/v1"])
        .args(["--workspace-id", "111"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workspace initialized"));

    ws.assert_file_exists(".cfgsync/config.toml");
    ws.assert_file_exists(".cfgsync/.gitignore");
    let config = ws.read_file(".cfgsync/config.toml");
    assert!(config.contains("prod.example.com"));
    assert!(config.contains("111"));
}

#[test]
fn test_init_twice_fails() {
    let ws = initialized();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .args(["init", "--tenant", "qa", "--base-url", "https://qa.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_rejects_bad_url() {
    let ws = TestWorkspace::new();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .args(["init", "--tenant", "prod", "--base-url", "prod.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http://"));
    ws.assert_file_not_exists(".cfgsync/config.toml");
}

// ============================================================================
// Workspace detection and credentials
// ============================================================================

#[test]
fn test_command_outside_workspace_fails() {
    let ws = TestWorkspace::new();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .arg("diff")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cfgsync init"));
}

#[test]
fn test_pull_without_token_reports_missing_credentials() {
    let ws = initialized();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .arg("pull")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing credentials"))
        .stderr(predicate::str::contains("CFGSYNC_TEST_TOKEN"));
    ws.assert_file_not_exists(".cfgsync/ledger.toml");
}

#[test]
fn test_unknown_tenant_fails() {
    let ws = initialized();
    cfgsync_cmd(&ws)
        .arg("--root")
        .arg(ws.root())
        .args(["copy", "--to", "staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging"));
}

#[test]
fn test_push_in_fresh_workspace_has_nothing_to_push() {
    let ws = initialized();
    cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .arg("push")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to push"));
}

#[test]
fn test_push_json_reports_status() {
    let ws = initialized();
    let output = cfgsync_cmd(&ws)
        .current_dir(ws.root())
        .args(["push", "--dry-run", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "nothing_to_push");
}

// ============================================================================
// Compare (offline)
// ============================================================================

fn pulled_pair() -> (TestWorkspace, TestWorkspace) {
    let source = TestWorkspace::new();
    source.write_file(
        "schemas/invoice_200.json",
        r#"{"id": 200, "name": "Invoice", "score_threshold": 0.8}"#,
    );
    let target = TestWorkspace::new();
    target.write_file(
        "schemas/invoice_5200.json",
        r#"{"id": 5200, "name": "Invoice", "score_threshold": 0.8}"#,
    );
    (source, target)
}

#[test]
fn test_compare_through_mapping_is_identical() {
    let (source, target) = pulled_pair();
    source.write_file("mapping.json", r#"{"schema": {"200": 5200}}"#);

    let output = cfgsync_cmd(&source)
        .arg("compare")
        .arg(source.root())
        .arg(target.root())
        .arg("--mapping")
        .arg(source.path("mapping.json"))
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["identical"], true);
}

#[test]
fn test_compare_reports_field_changes() {
    let (source, target) = pulled_pair();
    source.write_file("mapping.json", r#"{"schema": {"200": 5200}}"#);
    target.write_file(
        "schemas/invoice_5200.json",
        r#"{"id": 5200, "name": "Invoice", "score_threshold": 0.5}"#,
    );

    cfgsync_cmd(&source)
        .arg("compare")
        .arg(source.root())
        .arg(target.root())
        .arg("--mapping")
        .arg(source.path("mapping.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("score_threshold"))
        .stdout(predicate::str::contains("1 changed"));
}

#[test]
fn test_compare_without_mapping_sees_one_sided_objects() {
    let (source, target) = pulled_pair();

    let output = cfgsync_cmd(&source)
        .arg("compare")
        .arg(source.root())
        .arg(target.root())
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["identical"], false);
    assert_eq!(report["report"]["source_only"].as_array().unwrap().len(), 1);
    assert_eq!(report["report"]["target_only"].as_array().unwrap().len(), 1);
}

#[test]
fn test_compare_missing_directory_fails() {
    let (source, _target) = pulled_pair();
    cfgsync_cmd(&source)
        .arg("compare")
        .arg(source.root())
        .arg(source.path("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a directory"));
}
