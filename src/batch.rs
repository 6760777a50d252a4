//! Serial batch orchestration with first-failure artifact capture.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;
use crate::target::{FuzzTarget, RunError, RunOutcome, TargetRunner};
use crate::utils::stop_soon;

/// Early-exit policy of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    /// Halt the batch at the first detected failure (CI default).
    StopOnFirstFailure,
    /// Run every target and aggregate all failures. The first failure still
    /// owns the well-known artifact path.
    RunAll,
}

/// Aggregate result over one batch invocation.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub any_failure: bool,
    /// First target that failed, in batch order.
    pub failing_target: Option<FuzzTarget>,
    /// Where the first failure's reproducer was relocated to.
    pub artifact_path: Option<PathBuf>,
    /// Names of every failing target (more than one only under `RunAll`).
    pub failed_targets: Vec<String>,
}

/// Hard failure of the batch itself; infrastructure malfunction rather than
/// a found bug.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("target {target}: {source}")]
    Run {
        target: String,
        #[source]
        source: RunError,
    },
    #[error("failed to save test case to {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Runs an ordered sequence of fuzz targets, one at a time, in the order
/// given. Order is significant: it decides which failure is reported first
/// and matches CI log expectations.
pub struct BatchOrchestrator<'a> {
    config: &'a Config,
    targets: Vec<FuzzTarget>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(config: &'a Config, targets: Vec<FuzzTarget>) -> Self {
        Self { config, targets }
    }

    pub fn run(&self) -> Result<BatchResult, BatchError> {
        let mut result = BatchResult::default();

        for target in &self.targets {
            if stop_soon() {
                log::info!("stop requested, skipping remaining targets");
                break;
            }
            log::info!("fuzzer {} started running", target.target_name());
            let runner = TargetRunner::new(self.config, target);
            let outcome = runner.run().map_err(|source| BatchError::Run {
                target: target.target_name().to_string(),
                source,
            })?;
            match outcome {
                RunOutcome::Clean => {
                    log::info!("fuzzer {} finished running", target.target_name());
                }
                RunOutcome::Failure {
                    test_case,
                    diagnostics,
                } => {
                    log::error!(
                        "fuzzer {} detected error:\n{}",
                        target.target_name(),
                        diagnostics.trim_end()
                    );
                    if !result.any_failure {
                        result.failing_target = Some(target.clone());
                        match test_case {
                            Some(test_case) => {
                                let to = self.config.testcase_path.clone();
                                relocate(&test_case, &to).map_err(|source| {
                                    BatchError::Artifact {
                                        path: to.clone(),
                                        source,
                                    }
                                })?;
                                log::info!("reproducer saved to {}", to.display());
                                result.artifact_path = Some(to);
                            }
                            None => {
                                log::warn!(
                                    "fuzzer {} reported no reproducer",
                                    target.target_name()
                                );
                            }
                        }
                    }
                    result.any_failure = true;
                    result.failed_targets.push(target.target_name().to_string());
                    if self.config.run_policy == RunPolicy::StopOnFirstFailure {
                        break;
                    }
                }
            }
        }
        Ok(result)
    }
}

/// Moves `from` to `to`, falling back to copy + remove across filesystems.
fn relocate(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}
