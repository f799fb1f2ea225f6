//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("jenkins-executor");
    cmd.assert()
        .failure()
        .code(2)
        .stdout("")
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn start_help_lists_annotation_flag() {
    let mut cmd = cargo_bin_cmd!("jenkins-executor");
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--annotation"));
}

#[test]
fn start_rejects_malformed_annotation() {
    let mut cmd = cargo_bin_cmd!("jenkins-executor");
    cmd.args([
        "start",
        "--build-id",
        "b1",
        "--container",
        "node:20",
        "--token",
        "t",
        "--annotation",
        "timeout",
    ])
    .assert()
    .failure()
    .code(2)
    .stderr(predicate::str::contains("expected KEY=VALUE"));
}

#[test]
fn stop_without_configuration_reports_error() {
    let mut cmd = cargo_bin_cmd!("jenkins-executor");
    cmd.args(["stop", "--build-id", "b1"])
        .env_remove("EXECUTOR_JENKINS_HOST")
        .env_remove("EXECUTOR_JENKINS_PASSWORD")
        .env_remove("EXECUTOR_ECOSYSTEM_API")
        .env_remove("EXECUTOR_ECOSYSTEM_STORE")
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("configuration"));
}
