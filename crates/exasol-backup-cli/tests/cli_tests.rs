//! CLI integration tests for exasol-backup.
//!
//! These tests verify command-line argument parsing, help output,
//! configuration validation and exit codes. None of them connect to a
//! database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the exasol-backup binary.
fn cmd() -> Command {
    Command::cargo_bin("exasol-backup").unwrap()
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

fn valid_config(dir: &Path) -> std::path::PathBuf {
    let dest = dir.join("backup");
    std::fs::create_dir(&dest).unwrap();
    write_config(
        dir,
        &format!(
            "source:\n  host: localhost\n  user: sys\n  password: exasol\n\
             backup:\n  destination: {}\n  match: \"sales.*\"\n  skip: \"sales.tmp_*\"\n  objects: [tables, views]\n",
            dest.display()
        ),
    )
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--destination"))
        .stdout(predicate::str::contains("--match"))
        .stdout(predicate::str::contains("--skip"))
        .stdout(predicate::str::contains("--objects"))
        .stdout(predicate::str::contains("--max-table-rows"))
        .stdout(predicate::str::contains("--max-view-rows"))
        .stdout(predicate::str::contains("--drop-extras"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("exasol-backup"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--shutdown-timeout"))
        .stdout(predicate::str::contains("[default: 60]"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_2() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nonexistent_config_file.yaml"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_empty_config_exits_with_code_2() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_destination_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "source:\n  host: localhost\n  user: sys\nbackup:\n  match: \"*.*\"\n",
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("destination"));
}

#[test]
fn test_run_with_bad_destination_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let config = valid_config(dir.path());
    let missing = dir.path().join("nope");

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "run",
            "--destination",
            missing.to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_run_with_unknown_object_type() {
    let dir = tempfile::tempdir().unwrap();
    let config = valid_config(dir.path());

    cmd()
        .args([
            "--config",
            config.to_str().unwrap(),
            "run",
            "--objects",
            "tables,indexes",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("indexes"));
}

// =============================================================================
// Validate Command
// =============================================================================

#[test]
fn test_validate_prints_predicate_and_objects() {
    let dir = tempfile::tempdir().unwrap();
    let config = valid_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("tables, views"))
        .stdout(predicate::str::contains("UPPER(local.s) LIKE UPPER('sales')"))
        .stdout(predicate::str::contains("AND NOT"));
}

#[test]
fn test_validate_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = valid_config(dir.path());

    let output = cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json", "validate"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["source"], "sys@localhost:8563");
    assert_eq!(json["objects"], serde_json::json!(["tables", "views"]));
}

#[test]
fn test_validate_does_not_print_password() {
    let dir = tempfile::tempdir().unwrap();
    let config = valid_config(dir.path());

    cmd()
        .args(["--config", config.to_str().unwrap(), "--verbosity", "debug", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exasol").not())
        .stderr(predicate::str::contains("password: exasol").not());
}
