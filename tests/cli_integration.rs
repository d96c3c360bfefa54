//! Integration tests for the agensight CLI
//!
//! Every test points the binary at a closed local port, so read commands run
//! their offline fallback paths and write commands must fail cleanly.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const OFFLINE_URL: &str = "http://127.0.0.1:9";

/// Helper to run agensight from `dir` against the offline backend
fn run_agensight(args: &[&str], dir: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_agensight"))
        .args(args)
        .args(["--api-url", OFFLINE_URL])
        .current_dir(dir)
        .env_remove("AGENSIGHT_API_URL")
        .env_remove("AGENSIGHT_LOG")
        .output()
        .expect("Failed to execute agensight")
}

/// Helper to get stdout as string
fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Helper to get stderr as string
fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// =============================================================================
// Basic Command Tests
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_agensight"))
        .arg("--help")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("agensight"));
    assert!(out.contains("versions"));
    assert!(out.contains("dashboard"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_agensight"))
        .arg("--version")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(stdout(&output).contains("agensight"));
}

// =============================================================================
// Shell Completion Tests
// =============================================================================

#[test]
fn test_completion_zsh() {
    let output = Command::new(env!("CARGO_BIN_EXE_agensight"))
        .args(["completion", "zsh"])
        .output()
        .expect("Failed to execute");

    assert!(
        output.status.success(),
        "completion zsh failed: {}",
        stderr(&output)
    );
    assert!(
        stdout(&output).contains("#compdef agensight"),
        "zsh completion should contain #compdef"
    );
}

#[test]
fn test_completion_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_agensight"))
        .args(["completion", "bash"])
        .output()
        .expect("Failed to execute");

    assert!(output.status.success());
    assert!(
        stdout(&output).contains("_agensight"),
        "bash completion should contain _agensight function"
    );
}

// =============================================================================
// Offline fallback
// =============================================================================

#[test]
fn test_versions_json_falls_back_offline() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["versions", "--json"], temp_dir.path());

    assert!(output.status.success(), "versions failed: {}", stderr(&output));
    let json: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("versions --json should print JSON");
    assert_eq!(json["fallback"], true);
    assert_eq!(json["versions"][0]["version"], "1.0.0");
    assert_eq!(json["versions"][0]["is_current"], true);
}

#[test]
fn test_versions_table_marks_fallback() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["versions"], temp_dir.path());

    assert!(output.status.success());
    assert!(stdout(&output).contains("v1.0.0"));
    assert!(stderr(&output).contains("fallback versions"));
}

#[test]
fn test_traces_fall_back_to_demo_data() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["traces", "--json"], temp_dir.path());

    assert!(output.status.success(), "traces failed: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json.as_array().map(|a| a.len()), Some(3));
}

#[test]
fn test_trace_timeline_offline() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["trace", "1", "--width", "40"], temp_dir.path());

    assert!(output.status.success(), "trace failed: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Weather and Trip Planning"));
    assert!(out.contains("Agent 1"));
    assert!(out.contains("get_weather"));
}

#[test]
fn test_unknown_trace_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["trace", "404"], temp_dir.path());

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"));
}

// =============================================================================
// Writes never fall back
// =============================================================================

#[test]
fn test_commit_rejects_empty_message() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(
        &["commit", "-m", "   ", "--from", "1.0.0"],
        temp_dir.path(),
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Please enter a commit message"));
}

#[test]
fn test_sync_offline_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = run_agensight(&["sync", "1.0.0"], temp_dir.path());

    assert!(!output.status.success());
    assert!(stderr(&output).contains("backend unreachable"));
}

#[test]
fn test_update_agent_rejects_bad_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let file = temp_dir.path().join("agent.json");
    std::fs::write(&file, "{ not json").unwrap();

    let output = run_agensight(
        &["update-agent", "--version", "1.0.0", "--file", "agent.json"],
        temp_dir.path(),
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("agent.json"));
}

// =============================================================================
// Configuration file
// =============================================================================

#[test]
fn test_config_file_is_found_from_subdirectory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_dir = temp_dir.path().join(".agensight");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[api]\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 1\n",
    )
    .unwrap();
    let nested = temp_dir.path().join("a").join("b");
    std::fs::create_dir_all(&nested).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_agensight"))
        .args(["versions", "--json"])
        .current_dir(&nested)
        .env_remove("AGENSIGHT_API_URL")
        .output()
        .expect("Failed to execute");

    assert!(output.status.success(), "{}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["fallback"], true);
}
