//! Shared helpers for module tests: throwaway workspaces and fake fuzz
//! targets backed by shell scripts.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// A fresh config whose workspace and build-out dirs live under the system
/// temp dir, keyed by `tag` so tests do not collide.
pub fn test_config(tag: &str) -> Config {
    let root = std::env::temp_dir().join(format!("fuzzci-test-{}-{}", tag, std::process::id()));
    let out_dir = root.join("out");
    fs::create_dir_all(&out_dir).unwrap();
    Config {
        project_name: "example".to_string(),
        workspace: root.clone(),
        out_dir,
        testcase_path: root.join("testcase"),
        ..Config::default()
    }
}

/// Writes an executable shell script posing as a fuzz-target binary. The
/// embedded engine symbol makes it pass discovery.
pub fn fake_target(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!("#!/bin/sh\n# LLVMFuzzerTestOneInput\n{}", body);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
