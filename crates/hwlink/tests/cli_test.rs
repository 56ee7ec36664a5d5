//! Integration tests for the `hwlink` CLI binary.
//!
//! Argument parsing, error classification output, simulations and config
//! handling, all isolated from the user's real configuration.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `hwlink` binary with env isolation.
fn hwlink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("hwlink");
    cmd.env("HOME", "/tmp/hwlink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/hwlink-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("HWLINK_CONFIG")
        .env_remove("HWLINK_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

fn json_stdout(args: &[&str]) -> Value {
    let output = hwlink_cmd().args(args).args(["-o", "json"]).output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = hwlink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    hwlink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("classify")
            .and(predicate::str::contains("decode"))
            .and(predicate::str::contains("simulate")),
    );
}

#[test]
fn test_completions_bash() {
    hwlink_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Classify ────────────────────────────────────────────────────────

#[test]
fn test_classify_status_word() {
    let report = json_stdout(&["classify", "Ledger device: denied", "--status", "0x6985", "-w", "ledger"]);
    assert_eq!(report["error"]["code"], "UserRejected");
    assert_eq!(report["userRejection"], true);
    assert_eq!(report["connectionState"]["status"], "error");
    assert_eq!(report["connectionState"]["reason"], "user_rejected");
}

#[test]
fn test_classify_message_table() {
    hwlink_cmd()
        .args(["classify", "Device is locked"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("AuthenticationDeviceLocked")
                .and(predicate::str::contains("device_locked")),
        );
}

#[test]
fn test_classify_rejects_unknown_wallet() {
    hwlink_cmd()
        .args(["classify", "oops", "--wallet", "keystone"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown wallet"));
}

// ── Decode ──────────────────────────────────────────────────────────

#[test]
fn test_decode_rpc_envelope() {
    let payload = r#"{"code":-32603,"message":"Device locked","data":{"code":"AuthenticationDeviceLocked","message":"Device locked","category":"authentication"}}"#;
    let report = json_stdout(&["decode", payload]);
    assert_eq!(report["error"]["code"], "AuthenticationDeviceLocked");
    assert_eq!(report["deviceEvent"], "device_locked");
}

#[test]
fn test_decode_invalid_json() {
    hwlink_cmd()
        .args(["decode", "{not json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn test_decode_from_stdin() {
    let output = hwlink_cmd()
        .args(["decode", "-", "-o", "json"])
        .write_stdin(r#"{"statusCode": 21781, "message": "locked"}"#)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["error"]["code"], "AuthenticationDeviceLocked");
}

// ── Simulate ────────────────────────────────────────────────────────

#[test]
fn test_simulate_happy_path() {
    let report = json_stdout(&["simulate", "--scenario", "happy"]);
    let steps = report["steps"].as_array().unwrap();
    let statuses: Vec<&str> = steps
        .iter()
        .map(|s| s["state"]["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["connected", "ready", "ready", "disconnected"]);
    assert_eq!(report["maxLiveAdapters"], 1);
}

#[test]
fn test_simulate_locked_device() {
    let report = json_stdout(&["simulate", "-s", "locked"]);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps[1]["state"]["reason"], "locked");
    assert_eq!(steps.last().unwrap()["state"]["status"], "ready");
}

#[test]
fn test_simulate_wrong_app() {
    let report = json_stdout(&["simulate", "-s", "wrong-app"]);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps[1]["state"]["status"], "awaiting_app");
    assert_eq!(steps[1]["state"]["app_name"], "Bitcoin");
    assert_eq!(steps.last().unwrap()["state"]["status"], "ready");
}

#[test]
fn test_simulate_unplug_reconnects() {
    let report = json_stdout(&["simulate", "-s", "unplug"]);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps[2]["state"]["status"], "disconnected");
    assert_eq!(steps[3]["state"]["status"], "connected");
}

#[test]
fn test_simulate_race_single_winner() {
    let report = json_stdout(&["simulate", "-s", "race"]);
    assert_eq!(report["maxLiveAdapters"], 1);
    assert_eq!(report["adaptersCreated"], 2);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps[0]["note"], "superseded by a newer attempt");
    assert_eq!(steps[1]["note"], "connected");
}

#[test]
fn test_simulate_trezor_skips_app_check() {
    let report = json_stdout(&["simulate", "-s", "happy", "-w", "trezor"]);
    assert_eq!(report["wallet"], "trezor");
    assert_eq!(report["steps"][1]["state"]["status"], "ready");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    hwlink_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[auto_connect]")
                .and(predicate::str::contains("max_retries = 3")),
        );
}

#[test]
fn test_config_show_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hwlink.toml");
    std::fs::write(&path, "[auto_connect]\nmax_retries = 9\n").unwrap();

    let report = json_stdout(&["config", "show", "--config", path.to_str().unwrap()]);
    assert_eq!(report["auto_connect"]["max_retries"], 9);
}

#[test]
fn test_config_invalid_delays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hwlink.toml");
    std::fs::write(
        &path,
        "[auto_connect]\nretry_delay_ms = 9000\nmax_retry_delay_ms = 10\n",
    )
    .unwrap();

    hwlink_cmd()
        .args(["config", "show", "--config", path.to_str().unwrap()])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("max_retry_delay_ms"));
}

#[test]
fn test_config_path_honours_flag() {
    hwlink_cmd()
        .args(["config", "path", "--config", "/tmp/custom-hwlink.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/custom-hwlink.toml"));
}
