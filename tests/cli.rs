// ABOUTME: Integration tests for the apostello CLI commands.
// ABOUTME: Validates --help output, init behavior, and configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn apostello_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("apostello"))
}

#[test]
fn help_shows_commands() {
    apostello_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("apostello.yml");

    apostello_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--service", "orders"])
        .assert()
        .success();

    assert!(config_path.exists(), "apostello.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("service: orders"));
    assert!(content.contains("image:"), "Config should have image field");
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("apostello.yml");

    fs::write(&config_path, "existing: config").unwrap();

    apostello_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn init_rejects_invalid_service_name() {
    let temp_dir = tempfile::tempdir().unwrap();

    apostello_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--service", "Bad_Name"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn deploy_without_config_exits_with_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();

    apostello_cmd()
        .current_dir(temp_dir.path())
        .arg("deploy")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn status_without_config_exits_with_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();

    apostello_cmd()
        .current_dir(temp_dir.path())
        .arg("status")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn deploy_rejects_malformed_deadline() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(
        temp_dir.path().join("apostello.yml"),
        "service: orders\nimage: ghcr.io/acme/orders:latest\nhost:\n  host: vm.example.com\nport: 8080\n",
    )
    .unwrap();

    apostello_cmd()
        .current_dir(temp_dir.path())
        .args(["deploy", "--deadline", "not-a-duration"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--deadline"));
}

#[test]
fn unknown_flag_exits_with_usage_error_code() {
    apostello_cmd()
        .arg("--no-such-flag")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}
