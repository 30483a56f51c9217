#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    /// New project with `tasksmith init` already run
    pub fn init() -> Self {
        let project = Self::new();
        project.cmd().arg("init").assert().success();
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".tasksmith.toml", contents)
    }

    pub fn context_file(&self) -> PathBuf {
        self.dir.path().join(".tasksmith").join("context.json")
    }

    pub fn read_context(&self) -> Value {
        let raw = fs::read_to_string(self.context_file()).expect("read context");
        serde_json::from_str(&raw).expect("context json")
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = tasksmith_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    /// Run a command with `--json` and return the parsed envelope
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .args(args)
            .arg("--json")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("json envelope")
    }

    pub fn add_task(&self, id: &str, title: &str, extra: &[&str]) {
        self.cmd()
            .args(["task", "add", id, title])
            .args(extra)
            .assert()
            .success();
    }
}

pub fn tasksmith_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tasksmith").expect("binary");
    cmd.env_remove("TASKSMITH_ROOT");
    cmd.env_remove("RUST_LOG");
    cmd
}
