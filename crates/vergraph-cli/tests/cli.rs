//! End-to-end tests for the vergraph binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DATASET: &str = r#"[
    {"id": "n1", "type": "node", "loc": [0.0, 0.0]},
    {"id": "n2", "type": "node", "loc": [1.0, 0.0]},
    {"id": "w1", "type": "way", "nodes": ["n1", "n2"], "tags": {"highway": "path"}}
]"#;

const SCRIPT: &str = r#"{"steps": [
    {"op": "replace", "entity": {"id": "w2", "type": "way", "nodes": ["n1"]}},
    {"op": "remove", "id": "w1"},
    {"op": "rebase", "entities": [{"id": "w3", "type": "way", "nodes": ["n1", "n2"]}]},
    {"op": "batch", "steps": [
        {"op": "replace", "entity": {"id": "r1", "type": "relation", "members": [{"id": "n2", "type": "node"}]}},
        {"op": "revert", "id": "w2"}
    ]},
    {"op": "undo"}
]}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dataset.json"), DATASET).unwrap();
        std::fs::write(dir.path().join("script.json"), SCRIPT).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config_path(&self) -> PathBuf {
        self.path("config").join("config.toml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("vergraph").unwrap();
        cmd.env("VERGRAPH_CONFIG", self.config_path())
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path());
        cmd
    }
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn sorted(value: &serde_json::Value) -> Vec<String> {
    let mut ids: Vec<String> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

fn file_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_inspect_summary() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["inspect", file_arg(&ws.path("dataset.json"))])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entities: 3"))
        .stdout(predicate::str::contains("Nodes: 2"))
        .stdout(predicate::str::contains("Layers: 3 base, 0 local"));
}

#[test]
fn test_inspect_entity_json() {
    let ws = Workspace::new();
    let report = json_output(ws.cmd().args([
        "inspect",
        file_arg(&ws.path("dataset.json")),
        "--id",
        "n1",
        "--format",
        "json",
    ]));

    assert_eq!(report["entity"]["id"], "n1");
    assert_eq!(sorted(&report["parents"]["parent_ways"]), vec!["w1"]);
    assert_eq!(report["overridden"], false);
}

#[test]
fn test_inspect_missing_entity_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["inspect", file_arg(&ws.path("dataset.json")), "--id", "n9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entity not found: n9"));
}

#[test]
fn test_replay_reports_head() {
    let ws = Workspace::new();
    let report = json_output(ws.cmd().args([
        "replay",
        file_arg(&ws.path("dataset.json")),
        file_arg(&ws.path("script.json")),
        "--id",
        "n1",
        "--id",
        "w1",
        "--format",
        "json",
    ]));

    assert_eq!(report["steps"], 5);
    assert_eq!(report["history"], 3);
    assert_eq!(report["rebase"]["merged"], 1);
    assert_eq!(sorted(&report["changes"]["created"]), vec!["w2"]);
    assert_eq!(sorted(&report["changes"]["deleted"]), vec!["w1"]);
    assert_eq!(sorted(&report["parents"][0]["parent_ways"]), vec!["w2", "w3"]);
    assert_eq!(report["parents"][1]["present"], false);
}

#[test]
fn test_replay_table_output() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "replay",
            file_arg(&ws.path("dataset.json")),
            file_arg(&ws.path("script.json")),
            "--id",
            "n2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 5 steps, 3 snapshots in history"))
        .stdout(predicate::str::contains("Deleted: w1"))
        .stdout(predicate::str::contains("n2: ways [w3] relations [-]"));
}

#[test]
fn test_replay_failing_step() {
    let ws = Workspace::new();
    std::fs::write(
        ws.path("bad.json"),
        r#"{"steps": [{"op": "undo"}]}"#,
    )
    .unwrap();

    ws.cmd()
        .args([
            "replay",
            file_arg(&ws.path("dataset.json")),
            file_arg(&ws.path("bad.json")),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Step 1 (undo) failed"));
}

#[test]
fn test_config_round_trip() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "set", "output_format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set output_format = json"));
    ws.cmd()
        .args(["config", "get", "output_format"])
        .assert()
        .success()
        .stdout(predicate::str::diff("json\n"));

    // the configured format now applies without a flag
    let summary = json_output(ws.cmd().args(["inspect", file_arg(&ws.path("dataset.json"))]));
    assert_eq!(summary["entities"], 3);

    ws.cmd()
        .args(["config", "set", "colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_config_init_requires_force() {
    let ws = Workspace::new();
    ws.cmd().args(["config", "init"]).assert().success();
    assert!(ws.config_path().exists());

    ws.cmd()
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    ws.cmd().args(["config", "init", "--force"]).assert().success();
}

#[test]
fn test_config_path_honours_override() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_completions() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vergraph"));
}

#[test]
fn test_malformed_config_warns_and_uses_defaults() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.path("config")).unwrap();
    std::fs::write(ws.config_path(), "output_format = [").unwrap();

    ws.cmd()
        .args(["config", "get", "output_format"])
        .assert()
        .success()
        .stdout(predicate::str::contains("table"))
        .stderr(predicate::str::contains("Ignoring config"))
        .stderr(predicate::str::contains("Malformed config"));
}
