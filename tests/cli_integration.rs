//! CLI integration tests
//!
//! Tests the CLI surface of both binaries without touching the network.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_generate_version_flag() {
    let mut cmd = Command::cargo_bin("perchance-gen").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_generate_help_flag() {
    let mut cmd = Command::cargo_bin("perchance-gen").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("prompt"))
        .stdout(predicate::str::contains("shape"))
        .stdout(predicate::str::contains("guidance-scale"));
}

#[test]
fn test_generate_requires_prompt() {
    let mut cmd = Command::cargo_bin("perchance-gen").unwrap();

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--prompt"));
}

#[test]
fn test_generate_rejects_unknown_shape() {
    let mut cmd = Command::cargo_bin("perchance-gen").unwrap();
    cmd.args(["--prompt", "a cat", "--shape", "circle"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid shape"));
}

#[test]
fn test_server_version_flag() {
    let mut cmd = Command::cargo_bin("perchance-gen-server").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_server_help_flag() {
    let mut cmd = Command::cargo_bin("perchance-gen-server").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("port"))
        .stdout(predicate::str::contains("host"))
        .stdout(predicate::str::contains("verbose"));
}
