//! Fuzzing-engine collaborator: invocation of libFuzzer-style target
//! binaries and defect detection from their diagnostic output.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use regex::Regex;

use crate::config::Config;
use crate::target::FuzzTarget;

/// Output markers the engine or a sanitizer prints when a defect (crash,
/// hang, leak, OOM) was detected.
const DEFECT_MARKERS: &[&str] = &[
    "ERROR: AddressSanitizer",
    "ERROR: LeakSanitizer",
    "ERROR: MemorySanitizer",
    "ERROR: ThreadSanitizer",
    "ERROR: UndefinedBehaviorSanitizer",
    "ERROR: libFuzzer: deadly signal",
    "ERROR: libFuzzer: timeout",
    "ERROR: libFuzzer: out-of-memory",
    "SUMMARY: libFuzzer",
];

lazy_static! {
    static ref TEST_UNIT_RE: Regex = Regex::new(r"Test unit written to\s+(\S+)").unwrap();
}

/// Defect reported by the engine.
#[derive(Debug, Clone)]
pub struct Defect {
    /// Reproducing input, if the engine reported where it wrote one.
    pub test_case: Option<PathBuf>,
    /// Full diagnostic output of the run.
    pub diagnostics: String,
}

/// Builds the engine invocation for `target`.
///
/// The run duration is enforced by the supervisor, not by the engine, so no
/// time limit is passed; artifacts land in the build-out directory.
pub fn fuzzer_command(config: &Config, target: &FuzzTarget) -> Command {
    let mut cmd = Command::new(target.path());
    cmd.arg(format!("-artifact_prefix={}/", config.out_dir.display()))
        .arg("-print_final_stats=1")
        .current_dir(&config.out_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Scans engine diagnostics for a defect report. Relative artifact paths are
/// resolved against `base_dir`, the directory the engine ran in.
pub fn detect_defect(diagnostics: &str, base_dir: &Path) -> Option<Defect> {
    if !DEFECT_MARKERS.iter().any(|m| diagnostics.contains(m)) {
        return None;
    }
    let test_case = TEST_UNIT_RE.captures(diagnostics).map(|caps| {
        let raw = Path::new(caps.get(1).unwrap().as_str());
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            base_dir.join(raw)
        }
    });
    Some(Defect {
        test_case,
        diagnostics: diagnostics.to_string(),
    })
}
