//! CLI integration tests

use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "k8s-advisor-cli", "--"])
        .args(args)
        .env_remove("ADVISOR_PROMETHEUS_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Replica and resource advisor"),
        "Should show about text"
    );
    assert!(stdout.contains("advise"), "Should show advise command");
    assert!(stdout.contains("trend"), "Should show trend command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("k8s-advisor"), "Should show binary name");
}

/// Test advise subcommand help
#[test]
fn test_advise_help() {
    let output = run_cli(&["advise", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Advise help should succeed");
    assert!(stdout.contains("--parallel"), "Should show parallel option");
    assert!(stdout.contains("--concurrency"), "Should show concurrency option");
    assert!(stdout.contains("--output"), "Should show output option");
    assert!(stdout.contains("--namespace"), "Should show global namespace option");
}

/// Test trend subcommand help
#[test]
fn test_trend_help() {
    let output = run_cli(&["trend", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Trend help should succeed");
    assert!(stdout.contains("--strategy"), "Should show strategy option");
    assert!(stdout.contains("--lookback-hours"), "Should show lookback option");
    assert!(stdout.contains("--step-secs"), "Should show step option");
}

/// Test format and endpoint options
#[test]
fn test_global_options() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--prometheus-url"), "Should show endpoint option");
    assert!(stdout.contains("ADVISOR_PROMETHEUS_URL"), "Should show env var");
    assert!(stdout.contains("--metrics-file"), "Should show metrics file option");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = run_cli(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test unknown trend strategy is rejected
#[test]
fn test_invalid_strategy() {
    let output = run_cli(&["trend", "--strategy", "ewma"]);
    assert!(!output.status.success(), "Unknown strategy should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown trend strategy"), "Should name the problem");
}

/// Test missing endpoint is a configuration error
#[test]
fn test_missing_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("advisor.yaml");
    std::fs::write(&config, "namespaces: [shop]\n").expect("write config");

    let output = run_cli(&["--config", config.to_str().expect("utf-8 path"), "advise"]);
    assert!(!output.status.success(), "Missing endpoint should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("metrics endpoint must not be empty"),
        "Should report the configuration error"
    );
}
