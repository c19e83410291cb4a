#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const EVENT_PREFIX: &str = "@@dep-finder-event ";

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub stats: PathBuf,
    pub log_file: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().to_path_buf();
        let stats = write_fixture_stats(&root);
        let log_file = root.join("logs/dep-finder.log");
        Self {
            _tmp: tmp,
            root,
            stats,
            log_file,
        }
    }

    /// Command with the host output log pointed into the temp dir.
    pub fn cmd(&self) -> Command {
        self.cmd_logging_to(&self.log_file)
    }

    pub fn cmd_logging_to(&self, log_file: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("dep-finder");
        cmd.env_remove("DEP_FINDER_LOG")
            .arg("--log-file")
            .arg(log_file);
        cmd
    }

    pub fn stats_cmd(&self, pattern: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["-d", pattern, "--stats"]).arg(&self.stats);
        cmd
    }

    pub fn run_json(&self, args: &[&str]) -> Value {
        let out = self
            .cmd()
            .arg("--json")
            .arg("--stats")
            .arg(&self.stats)
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    pub fn log_text(&self) -> String {
        fs::read_to_string(&self.log_file).unwrap_or_default()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }
}

/// `foo.js` imports `bar.js`, which imports `target.js`.
fn write_fixture_stats(base: &Path) -> PathBuf {
    let stats = json!({
        "modules": [
            {"identifier": "/app/foo.js", "nameForCondition": "foo.js"},
            {"identifier": "/app/bar.js", "nameForCondition": "bar.js", "issuer": "/app/foo.js"},
            {"identifier": "/app/target.js", "nameForCondition": "target.js", "issuer": "/app/bar.js"}
        ]
    });
    let path = base.join("stats.json");
    fs::write(&path, stats.to_string()).expect("write stats");
    path
}

pub fn event(payload: Value) -> String {
    format!("echo '{EVENT_PREFIX}{payload}'")
}

/// Shell script replaying the fixture graph as a host build, with some
/// host chatter on both channels.
pub fn trace_script() -> String {
    [
        "echo 'compiling bundle...'".to_string(),
        event(json!({"event": "beforeRun"})),
        event(json!({"event": "moduleVisited", "identifier": "./foo.js", "resource": "foo.js"})),
        "echo 'host warning: slow loader' >&2".to_string(),
        event(json!({"event": "moduleVisited", "identifier": "./bar.js", "resource": "bar.js", "issuer": "./foo.js"})),
        event(json!({"event": "moduleVisited", "identifier": "./target.js", "resource": "target.js", "issuer": "./bar.js"})),
        event(json!({"event": "done"})),
        "echo 'bundle written'".to_string(),
    ]
    .join("\n")
}
