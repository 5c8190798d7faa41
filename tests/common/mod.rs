#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{TempDir, tempdir};

/// Absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn fixture_arg(name: &str) -> String {
    fixture_path(name).to_string_lossy().into_owned()
}

/// The `csv-insight` binary with logging silenced.
pub fn insight() -> Command {
    let mut cmd = Command::cargo_bin("csv-insight").expect("binary exists");
    cmd.env("RUST_LOG", "off");
    cmd
}

/// Runs the binary and parses stdout as JSON.
pub fn run_json(args: &[&str]) -> serde_json::Value {
    let assert = insight().args(args).assert().success();
    serde_json::from_slice(&assert.get_output().stdout).expect("stdout is JSON")
}

/// Scratch directory that is removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }
}
