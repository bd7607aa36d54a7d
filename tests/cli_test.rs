//! CLI surface tests for the nettoolbox binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_server() {
    Command::cargo_bin("nettoolbox")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("nettoolbox"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn version_flag_prints_a_version() {
    Command::cargo_bin("nettoolbox")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nettoolbox"));
}

#[test]
fn unknown_flag_fails() {
    Command::cargo_bin("nettoolbox")
        .unwrap()
        .arg("--no-such-flag")
        .assert()
        .failure();
}

#[test]
fn missing_config_file_is_a_fatal_error() {
    Command::cargo_bin("nettoolbox")
        .unwrap()
        .args(["--config", "/nonexistent/nettoolbox.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn invalid_config_file_is_a_fatal_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    use std::io::Write;
    writeln!(file, "port = \"not a number\"").unwrap();

    Command::cargo_bin("nettoolbox")
        .unwrap()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
