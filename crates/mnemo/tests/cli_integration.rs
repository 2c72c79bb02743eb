//! CLI integration tests for the mnemo command-line interface.
//!
//! These tests run the real binary against a temporary storage directory
//! with the vector store disabled, so no network access is needed.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A mnemo command isolated from the user's config and log directory.
fn mnemo(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mnemo").unwrap();
    cmd.env("MNEMO_CONFIG_DIR", config_dir)
        .env_remove("MNEMO_CONFIG")
        .env_remove("MNEMO_EMBEDDING_API_KEY");
    cmd
}

/// Write a config pointing at `sessions` and a snapshot for one session.
fn fixture() -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().unwrap();
    let sessions = tmp.path().join("sessions");
    fs::create_dir_all(&sessions).unwrap();

    fs::write(
        sessions.join("telegram_123456.json"),
        r#"{
  "key": "telegram:123456",
  "messages": [
    {"role": "user", "content": "What is 2+2?"},
    {"role": "assistant", "content": "Let me calculate...", "tool_calls": [
      {"id": "call_1", "type": "function", "function": {"name": "calculator", "arguments": "{\"expression\":\"2+2\"}"}}
    ]},
    {"role": "tool", "content": "4", "tool_call_id": "call_1"},
    {"role": "assistant", "content": "The answer is 4"}
  ],
  "summary": "arithmetic",
  "created": "2025-01-01T10:00:00Z",
  "updated": "2025-01-01T10:05:00Z"
}"#,
    )
    .unwrap();
    fs::write(sessions.join("corrupt.json"), "{oops").unwrap();

    let config = tmp.path().join("mnemo-test.toml");
    fs::write(
        &config,
        format!(
            "[session]\nstorage_dir = {:?}\n\n[vector_store]\nenabled = false\n",
            sessions.display().to_string()
        ),
    )
    .unwrap();

    (tmp, config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let tmp = TempDir::new().unwrap();
    mnemo(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("reindex"))
        .stdout(predicate::str::contains("forget"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_version_displays() {
    let tmp = TempDir::new().unwrap();
    mnemo(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mnemo"));
}

#[test]
fn test_search_requires_query() {
    let tmp = TempDir::new().unwrap();
    mnemo(tmp.path()).arg("search").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sessions_lists_snapshot_and_skips_corrupt() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\": \"telegram:123456\""))
        .stdout(predicate::str::contains("\"messages\": 4"))
        .stdout(predicate::str::contains("corrupt").not());
}

#[test]
fn test_history_prints_messages() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["history", "telegram:123456", "--last", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The answer is 4"))
        .stdout(predicate::str::contains("What is 2+2?").not());
}

#[test]
fn test_history_unknown_session() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["history", "discord:1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No messages"));
}

#[test]
fn test_search_without_vector_store_fails() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["search", "arithmetic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("semantic memory is not available"));
}

#[test]
fn test_forget_requires_confirmation() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["forget", "telegram:123456"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_forget_clears_snapshot() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .arg("--config")
        .arg(&config)
        .args(["forget", "telegram:123456", "--yes"])
        .assert()
        .success();

    let snapshot = fs::read_to_string(tmp.path().join("sessions/telegram_123456.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(value["messages"].as_array().unwrap().len(), 0);
    assert_eq!(value["key"], "telegram:123456");
}

#[test]
fn test_check_reports_disabled_vector_store() {
    let (tmp, config) = fixture();
    mnemo(tmp.path())
        .args(["--json", "--config"])
        .arg(&config)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"enabled\": false"))
        .stdout(predicate::str::contains("\"api_key_set\": false"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    mnemo(tmp.path())
        .args(["--config", "/nonexistent/mnemo.toml", "sessions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading config"));
}
