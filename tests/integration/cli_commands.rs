#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use affinity::config::DB_PATH_ENV;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    db: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("ratings.db");
        Self { dir, db }
    }

    fn seeded() -> Self {
        let ws = Self::new();
        ws.cmd().arg("seed-demo").assert().success();
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("affinity");
        cmd.env_remove(DB_PATH_ENV)
            .env("RUST_LOG", "off")
            .arg("--config")
            .arg(self.path("config.toml"))
            .arg("--db")
            .arg(&self.db);
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(["--format", "json"])
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("valid json")
    }
}

fn write_csv(path: &Path, body: &str) {
    fs::write(path, body).expect("write csv");
}

#[test]
fn seed_demo_reports_row_count() {
    let ws = Workspace::new();
    let json = ws.json(&["seed-demo"]);
    assert_eq!(json["ratings"], 14);
    assert_eq!(json["synthetic"], false);
    assert!(ws.db.exists());
}

#[test]
fn synthetic_seed_is_deterministic() {
    let first = Workspace::new();
    let second = Workspace::new();
    let args = ["seed-demo", "--synthetic", "--users", "12", "--items", "6", "--seed", "7"];
    let a = first.json(&args);
    let b = second.json(&args);
    assert_eq!(a["ratings"], b["ratings"]);
    assert!(a["ratings"].as_u64().unwrap_or(0) > 0);
    assert_eq!(
        first.json(&["recommend", "101"])["recommendations"],
        second.json(&["recommend", "101"])["recommendations"]
    );
}

#[test]
fn synthetic_options_require_flag() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["seed-demo", "--users", "5"])
        .assert()
        .failure();
}

#[test]
fn train_emits_report() {
    let ws = Workspace::seeded();
    let json = ws.json(&["train"]);
    assert_eq!(json["ratings"], 14);
    assert_eq!(json["users"], 5);
    assert_eq!(json["items"], 5);
    assert!(json["duration_ms"].is_number());
}

#[test]
fn train_without_database_fails() {
    let ws = Workspace::new();
    let assert = ws.cmd().arg("train").assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("error:"), "stderr: {stderr}");
    assert!(!ws.db.exists());
}

#[test]
fn recommend_ranks_similar_items() {
    let ws = Workspace::seeded();
    let json = ws.json(&["recommend", "101", "--top-n", "2"]);
    let recs = json["recommendations"].as_array().expect("array");
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["item_id"], 102);
    assert_eq!(recs[1]["item_id"], 103);
    assert!(recs.iter().all(|rec| rec["item_id"] != 101));
    assert_eq!(json["training"]["items"], 5);
}

#[test]
fn recommend_defaults_to_three_results() {
    let ws = Workspace::seeded();
    let json = ws.json(&["recommend", "104"]);
    assert_eq!(json["recommendations"].as_array().map(Vec::len), Some(3));
}

#[test]
fn recommend_unknown_item_warns() {
    let ws = Workspace::seeded();
    let assert = ws.cmd().args(["recommend", "999"]).assert().success();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("No similar items found for item 999"), "stderr: {stderr}");
}

#[test]
fn strategy_maps_scores_to_tiers() {
    let ws = Workspace::seeded();
    let json = ws.json(&["strategy", "101", "--top-n", "2"]);
    assert_eq!(json["threshold"], 0.5);
    let actions = json["actions"].as_array().expect("array");
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0]["action"]["item_id"], 102);
    assert_eq!(actions[0]["action"]["category"], "High-Value Cross-Sell");
    assert_eq!(actions[0]["action"]["priority"], "CRITICAL");
    assert_eq!(actions[1]["action"]["category"], "Inventory Awareness");
    assert_eq!(actions[1]["action"]["priority"], "MEDIUM");

    let lowered = ws.json(&["strategy", "101", "--top-n", "2", "--threshold", "0.4"]);
    assert_eq!(lowered["actions"][1]["action"]["category"], "Bundle Optimization");
    assert_eq!(lowered["actions"][1]["action"]["priority"], "HIGH");
}

#[test]
fn strategy_rejects_threshold_out_of_range() {
    let ws = Workspace::seeded();
    ws.cmd()
        .args(["strategy", "101", "--threshold", "1.5"])
        .assert()
        .failure();
}

#[test]
fn import_then_metrics() {
    let ws = Workspace::new();
    let csv = ws.path("ratings.csv");
    write_csv(
        &csv,
        "user_id,item_id,rating\n1,101,5\n2,101,3\n1,102,4\n",
    );
    let summary = ws.json(&["import", csv.to_str().expect("utf8 path")]);
    assert_eq!(summary["rows_imported"], 3);

    let metrics = ws.json(&["metrics"]);
    let rows = metrics.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["item_id"], 101);
    assert_eq!(rows[0]["total_interactions"], 2);
    assert_eq!(rows[0]["avg_score"], 4.0);
}

#[test]
fn import_append_keeps_rows() {
    let ws = Workspace::seeded();
    let csv = ws.path("extra.csv");
    write_csv(&csv, "user_id,item_id,rating\n6,106,4.5\n");
    ws.cmd().arg("import").arg(&csv).arg("--append").assert().success();
    let report = ws.json(&["train"]);
    assert_eq!(report["ratings"], 15);
    assert_eq!(report["items"], 6);
}

#[test]
fn import_reports_bad_line() {
    let ws = Workspace::seeded();
    let csv = ws.path("bad.csv");
    write_csv(&csv, "user_id,item_id,rating\n1,101,5\n1,102,11\n");
    let assert = ws.cmd().arg("import").arg(&csv).assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("line 3"), "stderr: {stderr}");
    assert_eq!(ws.json(&["train"])["ratings"], 14);
}

#[test]
fn export_writes_csv() {
    let ws = Workspace::seeded();
    let out = ws.path("out.csv");
    let summary = ws.json(&["export", out.to_str().expect("utf8 path")]);
    assert_eq!(summary["rows_exported"], 14);
    let body = fs::read_to_string(&out).expect("read export");
    assert!(body.starts_with("user_id,item_id,rating\n1,101,5\n"));
    assert_eq!(body.lines().count(), 15);
}

#[test]
fn config_show_reflects_overrides() {
    let ws = Workspace::new();
    let json = ws.json(&["config", "show"]);
    assert_eq!(json["database"]["path"], ws.db.to_str().expect("utf8 path"));
    assert_eq!(json["recommend"]["top_n"], 3);
    assert_eq!(json["strategy"]["threshold"], 0.5);
}

#[test]
fn config_show_prints_toml() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("[recommend]"), "stdout: {text}");
    assert!(text.contains("top_n = 3"), "stdout: {text}");
}

#[test]
fn dashboard_bind_failure_reports_once() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = taken.local_addr().expect("addr").port().to_string();
    let ws = Workspace::seeded();
    let assert = ws
        .cmd()
        .args(["dashboard", "--no-train", "--host", "127.0.0.1", "--port", &port])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1, "stderr: {stderr}");
    assert!(lines[0].starts_with("error: dashboard server error"), "stderr: {stderr}");
}

#[test]
fn config_file_sets_defaults() {
    let ws = Workspace::seeded();
    fs::write(ws.path("config.toml"), "[recommend]\ntop_n = 1\n").expect("write config");
    let json = ws.json(&["recommend", "101"]);
    assert_eq!(json["recommendations"].as_array().map(Vec::len), Some(1));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let ws = Workspace::new();
    ws.cmd().args(["config", "init"]).assert().success();
    assert!(ws.path("config.toml").exists());
    ws.cmd().args(["config", "init"]).assert().failure();
    ws.cmd()
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn completions_render_for_bash() {
    let output = Workspace::new()
        .cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let script = String::from_utf8_lossy(&output);
    assert!(script.contains("affinity"));
}
