//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `texter` binary and verify exit codes,
//! stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to the payload fixtures resolve.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SUPPORT: &str = "fixtures/support_contact.json";
const REASSIGNED: &str = "fixtures/reassigned_contact.json";
const BROKEN: &str = "fixtures/broken_tree.json";

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `texter` binary, rooted at workspace.
fn texter() -> Command {
    let mut cmd = cargo_bin_cmd!("texter");
    cmd.current_dir(workspace_root());
    cmd.env_remove("RUST_LOG");
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().unwrap();
    serde_json::from_slice(&out.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    texter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Texting-session engine driver"));
}

#[test]
fn version_exits_0() {
    texter()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("texter"));
}

// ──────────────────────────────────────────────
// 2. steps
// ──────────────────────────────────────────────

#[test]
fn steps_on_fresh_contact_shows_root_only() {
    texter()
        .args(["steps", SUPPORT])
        .assert()
        .success()
        .stdout(predicate::str::contains("  root  Support?"))
        .stdout(predicate::str::contains("  volunteer  Volunteer?").not())
        .stdout(predicate::str::contains("  volunteer = (none)"))
        .stdout(predicate::str::contains(
            "draft: Hi Sam, it's Ana with the campaign.",
        ));
}

#[test]
fn steps_follow_answers() {
    let doc = json_stdout(texter().args([
        "--output",
        "json",
        "steps",
        SUPPORT,
        "--answer",
        "root=yes",
    ]));
    let ids: Vec<&str> = doc["available"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["root", "volunteer"]);
    assert_eq!(doc["draft"], "Great! Would you volunteer in district 7?");
    assert_eq!(doc["current"]["question"]["text"], "Volunteer?");
    assert_eq!(doc["responses"]["root"], "yes");
    assert_eq!(doc["gate"], "open");
}

#[test]
fn re_answering_clears_the_follow_up() {
    let doc = json_stdout(texter().args([
        "--output",
        "json",
        "steps",
        SUPPORT,
        "--answer",
        "root=yes",
        "--answer",
        "volunteer=yes",
        "--answer",
        "root=no",
    ]));
    let ids: Vec<&str> = doc["available"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["root", "thanks-anyway"]);
    assert!(doc["responses"]["volunteer"].is_null());
    assert_eq!(doc["draft"], "Sorry to hear that. Have a great day!");
}

#[test]
fn answering_unknown_step_exits_1() {
    texter()
        .args(["steps", SUPPORT, "--answer", "ghost=yes"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn malformed_answer_flag_is_a_usage_error() {
    texter()
        .args(["steps", SUPPORT, "--answer", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STEP=VALUE"));
}

#[test]
fn broken_tree_is_fatal() {
    texter()
        .args(["--output", "json", "steps", BROKEN])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("\"fatal\":true"));
}

#[test]
fn missing_payload_exits_1() {
    texter()
        .args(["steps", "fixtures/nonexistent_xyz.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error reading file"));
}

#[test]
fn invalid_payload_json_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    texter()
        .args(["steps", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error parsing JSON"));
}

#[test]
fn reassigned_contact_shows_banner() {
    texter()
        .args(["steps", REASSIGNED])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Your assignment has changed [Back to Todos]",
        ));
}

// ──────────────────────────────────────────────
// 3. render
// ──────────────────────────────────────────────

#[test]
fn render_substitutes_fields() {
    texter()
        .args([
            "render",
            SUPPORT,
            "--script",
            "{firstName} in {zip}, district {district}, from {texterLastName}{unknown}.",
        ])
        .assert()
        .success()
        .stdout("Sam in 94110, district 7, from Diaz.\n")
        .stderr(predicate::str::contains("unresolved placeholders: unknown"));
}

#[test]
fn render_lists_unresolved_placeholders() {
    let doc = json_stdout(texter().args([
        "--output",
        "json",
        "render",
        SUPPORT,
        "--script",
        "Hi {firstName} {nickname}",
    ]));
    assert_eq!(doc["text"], "Hi Sam ");
    assert_eq!(doc["unresolved"], serde_json::json!(["nickname"]));
}

#[test]
fn render_ignores_undeclared_custom_fields() {
    texter()
        .args(["render", SUPPORT, "--script", "[{internal_note}]"])
        .assert()
        .success()
        .stdout("[]\n");
}

// ──────────────────────────────────────────────
// 4. submit / opt-out / close
// ──────────────────────────────────────────────

#[test]
fn submit_sends_then_saves() {
    texter()
        .args(["submit", SUPPORT, "--answer", "root=yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("submit completed (send, persist, delete)"))
        .stdout(predicate::str::contains("state: completed"))
        .stdout(predicate::str::contains("send_message k1 ok"));
}

#[test]
fn submit_json_reports_journal() {
    let doc = json_stdout(texter().args([
        "--output",
        "json",
        "submit",
        SUPPORT,
        "--answer",
        "root=yes",
        "--message",
        "Custom text",
    ]));
    assert_eq!(doc["state"]["state"], "completed");
    let calls = doc["calls"].as_array().unwrap();
    assert_eq!(calls[0]["operation"], "send_message");
    assert_eq!(calls[0]["detail"]["text"], "Custom text");
    assert_eq!(calls[1]["operation"], "update_question_responses");
    assert_eq!(calls[1]["detail"][0]["value"], "yes");
    assert_eq!(calls[2]["operation"], "delete_question_responses");
}

#[test]
fn empty_message_is_rejected_without_calls() {
    texter()
        .args(["submit", SUPPORT, "--message", ""])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("send_message").not())
        .stderr(predicate::str::contains("Can't send empty message"));
}

#[test]
fn failed_send_skips_persistence() {
    texter()
        .args([
            "submit",
            SUPPORT,
            "--answer",
            "root=yes",
            "--fail",
            "send_message=500:gateway timeout",
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("state: failed at send"))
        .stdout(predicate::str::contains("update_question_responses").not())
        .stderr(predicate::str::contains("Something went wrong!"));
}

#[test]
fn reassigned_send_returns_to_worklist() {
    texter()
        .args(["submit", SUPPORT, "--fail", "send_message=402:reassigned"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("returning to worklist"));
}

#[test]
fn assignment_changed_offers_recovery() {
    texter()
        .args([
            "--output",
            "json",
            "submit",
            SUPPORT,
            "--fail",
            "send_message=400:Your assignment has changed",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"recovery\":\"Back to Todos\""));
}

#[test]
fn reassigned_payload_refuses_submit() {
    texter()
        .args(["submit", REASSIGNED])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("calls:"))
        .stdout(predicate::str::contains("send_message").not());
}

#[test]
fn opt_out_uses_default_copy() {
    let doc = json_stdout(texter().args(["--output", "json", "opt-out", SUPPORT]));
    let calls = doc["calls"].as_array().unwrap();
    assert_eq!(
        calls[0]["detail"]["text"],
        "I'm opting you out of text-based communication immediately. Have a great day."
    );
    assert_eq!(calls[1]["operation"], "create_opt_out");
    assert_eq!(calls[1]["detail"]["cell"], "+15555550100");
}

#[test]
fn opt_out_copy_comes_from_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("texter.toml");
    fs::write(
        &config,
        "[session]\nopt_out_script = \"Removing you now. Text {START} to rejoin.\"\n",
    )
    .unwrap();
    let doc = json_stdout(texter().args([
        "--output",
        "json",
        "--config",
        config.to_str().unwrap(),
        "opt-out",
        SUPPORT,
    ]));
    assert_eq!(
        doc["calls"][0]["detail"]["text"],
        "Removing you now. Text {START} to rejoin."
    );
}

#[test]
fn missing_config_file_exits_1() {
    texter()
        .args(["--config", "no_such_config.toml", "steps", SUPPORT])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn close_persists_then_closes() {
    texter()
        .args(["close", SUPPORT, "--answer", "root=no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("close completed (persist, delete, status)"))
        .stdout(predicate::str::contains("send_message").not());
}

#[test]
fn quiet_suppresses_output() {
    texter()
        .args(["--quiet", "submit", SUPPORT, "--fail", "send_message=500:x"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}
