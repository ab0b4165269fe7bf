//! Integration tests for the `imap-alarms` binary.
//!
//! Every test runs in an empty temp directory with the `IMAP_ALARMS_*`
//! environment cleared, so no local config file leaks in.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

fn imap_alarms_cmd(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("imap-alarms");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    for (key, _) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("IMAP_ALARMS_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    imap_alarms_cmd(&dir).arg("--help").assert().success().stdout(
        predicate::str::contains("OpenNMS")
            .and(predicate::str::contains("once"))
            .and(predicate::str::contains("--delay")),
    );
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    imap_alarms_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imap-alarms"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = imap_alarms_cmd(&dir).arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--bogus"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    imap_alarms_cmd(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imap-alarms"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_shows_defaults_redacted() {
    let dir = TempDir::new().unwrap();
    imap_alarms_cmd(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("http://localhost:8980/opennms")
                .and(predicate::str::contains("delay = 15"))
                .and(predicate::str::contains("imap_port = 1993"))
                .and(predicate::str::contains("secret").not()),
        );
}

#[test]
fn test_config_file_and_flags_layer() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("imap-alarms.toml"),
        "url = \"https://nms.example.com/opennms\"\ndelay = 60\n",
    )
    .unwrap();

    imap_alarms_cmd(&dir)
        .args(["--delay", "5", "config"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://nms.example.com/opennms")
                .and(predicate::str::contains("delay = 5")),
        );
}

#[test]
fn test_zero_delay_is_config_error() {
    let dir = TempDir::new().unwrap();
    let output = imap_alarms_cmd(&dir)
        .args(["--delay", "0", "config"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("delay"));
}

#[test]
fn test_missing_explicit_config_file() {
    let dir = TempDir::new().unwrap();
    let output = imap_alarms_cmd(&dir)
        .args(["--config", "nope.toml", "config"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_once_mirrors_alarms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opennms/api/v2/alarms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "totalCount": 1,
            "offset": 0,
            "alarm": [{
                "id": 7,
                "severity": "MAJOR",
                "logMessage": "Node down",
                "description": "The node is down."
            }]
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = imap_alarms_cmd(&dir);
    cmd.args(["--url", &format!("{}/opennms", server.uri()), "once"]);
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();

    let text = combined_output(&output);
    assert!(output.status.success(), "once failed:\n{text}");
    assert!(
        text.contains("added 1, updated 0, removed 0, errors 0"),
        "unexpected output:\n{text}"
    );
}

#[test]
fn test_unreachable_server_exits_with_connection_code() {
    let dir = TempDir::new().unwrap();
    let output = imap_alarms_cmd(&dir)
        .env("IMAP_ALARMS_RETRIES", "0")
        .args(["--url", "http://127.0.0.1:1/opennms", "--timeout", "5", "once"])
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(7),
        "output:\n{}",
        combined_output(&output)
    );
}
