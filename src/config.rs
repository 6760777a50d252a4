//! Runtime configuration for a batch of fuzz-target runs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::batch::RunPolicy;
use crate::supervisor::DEFAULT_POLL_INTERVAL;

/// Seconds each target runs when nothing else is configured.
pub const DEFAULT_FUZZ_SECONDS: u64 = 20;

/// Well-known location CI tooling picks the reproducer up from.
pub const DEFAULT_TESTCASE_PATH: &str = "/tmp/testcase";

#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the project whose targets are run.
    pub project_name: String,
    /// CI working directory.
    pub workspace: PathBuf,
    /// Build-output directory containing the fuzz-target binaries.
    pub out_dir: PathBuf,
    /// Wall-clock seconds each target may run before forced termination.
    pub fuzz_seconds: u64,
    /// Where the first failure's reproducing test case is relocated to.
    pub testcase_path: PathBuf,
    /// Early-exit policy of the batch.
    pub run_policy: RunPolicy,
    /// Child liveness poll interval of the supervisor.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let workspace = PathBuf::from("./");
        Self {
            project_name: String::new(),
            out_dir: workspace.join("out"),
            workspace,
            fuzz_seconds: DEFAULT_FUZZ_SECONDS,
            testcase_path: PathBuf::from(DEFAULT_TESTCASE_PATH),
            run_policy: RunPolicy::StopOnFirstFailure,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("empty project name")]
    EmptyProjectName,
    #[error("bad workspace dir: {0}")]
    BadWorkspace(String),
    #[error("bad build-out dir: {0}")]
    BadOutDir(String),
    #[error("fuzz seconds must be positive")]
    ZeroDuration,
}

impl Config {
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.project_name.is_empty() {
            return Err(ConfigError::EmptyProjectName);
        }
        if !self.workspace.is_dir() {
            return Err(ConfigError::BadWorkspace(
                self.workspace.to_string_lossy().into_owned(),
            ));
        }
        if !self.out_dir.is_dir() {
            return Err(ConfigError::BadOutDir(
                self.out_dir.to_string_lossy().into_owned(),
            ));
        }
        if self.fuzz_seconds == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        Ok(())
    }

    /// Per-target run duration.
    pub fn fuzz_duration(&self) -> Duration {
        Duration::from_secs(self.fuzz_seconds)
    }
}
