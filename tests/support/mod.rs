#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Clock every test runs at unless it passes its own `--now`.
pub const NOW: &str = "2024-03-04T08:00:00Z";

/// A throwaway data directory pinned to UTC.
pub struct TestData {
    dir: TempDir,
}

impl TestData {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        fs::write(
            dir.path().join(".planner.toml"),
            "[time]\nutc_offset = \"+00:00\"\n",
        )
        .expect("failed to write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn key_file(&self, key: &str) -> PathBuf {
        self.dir.path().join(format!("{key}.json"))
    }

    pub fn read_key(&self, key: &str) -> Value {
        let raw = fs::read_to_string(self.key_file(key)).expect("key file");
        serde_json::from_str(&raw).expect("key json")
    }

    pub fn write_key(&self, key: &str, value: &Value) {
        fs::write(self.key_file(key), serde_json::to_string_pretty(value).unwrap())
            .expect("failed to write key");
    }

    /// `planner` pointed at this directory.
    pub fn cmd(&self) -> Command {
        let mut cmd = planner_cmd();
        cmd.arg("--data-dir").arg(self.dir.path());
        cmd
    }

    /// Run with `--json` at `now` and return the `data` payload.
    pub fn json_at(&self, now: &str, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(["--json", "--now", now])
            .args(args)
            .output()
            .expect("run planner");
        assert!(
            output.status.success(),
            "planner {:?} failed: {}{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let value: Value = serde_json::from_slice(&output.stdout).expect("json output");
        assert_eq!(value["status"], "success");
        value["data"].clone()
    }

    pub fn json(&self, args: &[&str]) -> Value {
        self.json_at(NOW, args)
    }

    /// Run with `--json` expecting failure; returns (exit code, envelope).
    pub fn json_err(&self, args: &[&str]) -> (i32, Value) {
        let output = self
            .cmd()
            .args(["--json", "--now", NOW])
            .args(args)
            .output()
            .expect("run planner");
        assert!(!output.status.success(), "planner {args:?} unexpectedly succeeded");
        let value: Value = serde_json::from_slice(&output.stdout).expect("json error output");
        (output.status.code().unwrap_or(-1), value)
    }

    /// Create a task and return its id.
    pub fn new_task(&self, name: &str, extra: &[&str]) -> String {
        let mut args = vec!["task", "new", name];
        args.extend_from_slice(extra);
        let data = self.json(&args);
        data["task"]["id"].as_str().expect("task id").to_string()
    }
}

pub fn planner_cmd() -> Command {
    let mut cmd = Command::cargo_bin("planner").expect("binary");
    cmd.env_remove("PLANNER_DATA_DIR")
        .env_remove("PLANNER_NOW")
        .env_remove("RUST_LOG");
    cmd
}
