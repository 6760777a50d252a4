//! Fuzz-target identity and single-run supervision.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::engine;
use crate::status::StatusSlot;
use crate::supervisor::{ProcessOutcome, ProcessSupervisor, SuperviseError};
use crate::utils::io::read_background;

/// One fuzzing entry point of a project. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzTarget {
    project_name: String,
    target_name: String,
    path: PathBuf,
    duration: Duration,
}

impl FuzzTarget {
    /// The target name is derived from the binary's base name.
    pub fn new<P: Into<PathBuf>>(project_name: &str, target_path: P, duration: Duration) -> Self {
        let path = target_path.into();
        let target_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            project_name: project_name.to_string(),
            target_name,
            path,
            duration,
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Terminal result of one supervised run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// No crash and no hang was detected within the duration. A target that
    /// merely ran out of time is clean too.
    Clean,
    /// The engine reported a defect; `test_case` reproduces it.
    Failure {
        test_case: Option<PathBuf>,
        diagnostics: String,
    },
}

/// Infrastructure failure of the supervision itself, distinct from a defect
/// found in the target.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("supervise: {0}")]
    Supervise(#[from] SuperviseError),
}

/// Runs one fuzz target for its configured duration and reports the outcome.
pub struct TargetRunner<'a> {
    config: &'a Config,
    target: &'a FuzzTarget,
    supervisor: ProcessSupervisor,
}

impl<'a> TargetRunner<'a> {
    pub fn new(config: &'a Config, target: &'a FuzzTarget) -> Self {
        Self {
            config,
            target,
            supervisor: ProcessSupervisor::new(config.poll_interval),
        }
    }

    /// Runs the target under supervision.
    ///
    /// The engine child process and a worker thread draining its output are
    /// the only two contexts of the run; they hand the result over through a
    /// [`StatusSlot`]. The worker is always joined before the slot is read,
    /// so a detection that occurred is never lost, even when the child was
    /// forcibly terminated at the deadline.
    pub fn run(&self) -> Result<RunOutcome, RunError> {
        let slot: Arc<StatusSlot<RunOutcome>> = Arc::new(StatusSlot::new());
        let mut cmd = engine::fuzzer_command(self.config, self.target);

        let out_dir = self.config.out_dir.clone();
        let name = self.target.target_name.clone();
        let worker_slot = Arc::clone(&slot);

        let (outcome, worker) =
            self.supervisor
                .run(&mut cmd, self.target.duration, move |child| {
                    log::debug!("fuzzer {} started, pid {}", name, child.id());
                    // stdout is drained in the background so the child can
                    // never block on a full pipe; the engine reports on
                    // stderr.
                    let stdout = child.stdout.take().map(read_background);
                    let mut stderr = child.stderr.take();
                    thread::spawn(move || {
                        let mut raw = Vec::new();
                        if let Some(stderr) = stderr.as_mut() {
                            let _ = stderr.read_to_end(&mut raw);
                        }
                        if let Some(stdout) = stdout {
                            raw.extend(stdout.wait_finish());
                        }
                        let diagnostics = String::from_utf8_lossy(&raw).into_owned();
                        if let Some(defect) = engine::detect_defect(&diagnostics, &out_dir) {
                            worker_slot.set(RunOutcome::Failure {
                                test_case: defect.test_case,
                                diagnostics: defect.diagnostics,
                            });
                        }
                    })
                })?;

        // The child has fully exited here; joining the worker orders its
        // slot write (if any) before the read below.
        if let Err(panic) = worker.join() {
            std::panic::resume_unwind(panic);
        }

        match outcome {
            ProcessOutcome::Completed(status) => {
                log::debug!("fuzzer {} exited with {}", self.target.target_name, status);
            }
            ProcessOutcome::TimedOut => {
                log::debug!("fuzzer {} ran out of time", self.target.target_name);
            }
        }

        Ok(slot.get().unwrap_or(RunOutcome::Clean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_target, test_config};
    use std::time::Instant;

    #[test]
    fn crashing_target_reports_failure_with_reproducer() {
        let config = test_config("target-crash");
        let path = fake_target(
            &config.out_dir,
            "crash_fuzzer",
            r#"echo junk > ./crash-1111
echo "==1==ERROR: AddressSanitizer: heap-buffer-overflow" >&2
echo "Test unit written to ./crash-1111" >&2
exit 1
"#,
        );
        let target = FuzzTarget::new("example", path, Duration::from_secs(10));
        let runner = TargetRunner::new(&config, &target);
        match runner.run().unwrap() {
            RunOutcome::Failure {
                test_case,
                diagnostics,
            } => {
                let test_case = test_case.unwrap();
                assert!(test_case.ends_with("crash-1111"));
                assert!(test_case.is_file());
                assert!(diagnostics.contains("AddressSanitizer"));
            }
            RunOutcome::Clean => panic!("defect should have been detected"),
        }
    }

    #[test]
    fn hanging_target_is_clean_after_the_deadline() {
        let mut config = test_config("target-hang");
        config.poll_interval = Duration::from_millis(50);
        let path = fake_target(&config.out_dir, "hang_fuzzer", "exec sleep 30\n");
        let duration = Duration::from_millis(300);
        let target = FuzzTarget::new("example", path, duration);
        let runner = TargetRunner::new(&config, &target);
        let start = Instant::now();
        let outcome = runner.run().unwrap();
        assert!(matches!(outcome, RunOutcome::Clean));
        assert!(start.elapsed() >= duration);
    }

    #[test]
    fn hanging_target_with_grandchild_does_not_block_past_the_deadline() {
        let mut config = test_config("target-grandchild");
        config.poll_interval = Duration::from_millis(50);
        // The backgrounded sleep inherits the stderr pipe; run() must not
        // wait on it once the deadline took the process group down.
        let path = fake_target(
            &config.out_dir,
            "forky_fuzzer",
            "sleep 30 &\nexec sleep 30\n",
        );
        let duration = Duration::from_millis(300);
        let target = FuzzTarget::new("example", path, duration);
        let runner = TargetRunner::new(&config, &target);
        let start = Instant::now();
        let outcome = runner.run().unwrap();
        assert!(matches!(outcome, RunOutcome::Clean));
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "run blocked on a grandchild's pipe"
        );
    }

    #[test]
    fn quiet_exit_is_clean() {
        let config = test_config("target-clean");
        let path = fake_target(&config.out_dir, "clean_fuzzer", "echo 'INFO: Seed: 1'\nexit 0\n");
        let target = FuzzTarget::new("example", path, Duration::from_secs(10));
        let runner = TargetRunner::new(&config, &target);
        assert!(matches!(runner.run().unwrap(), RunOutcome::Clean));
    }

    #[test]
    fn missing_binary_is_a_supervision_error() {
        let config = test_config("target-missing");
        let target = FuzzTarget::new(
            "example",
            config.out_dir.join("no_such_fuzzer"),
            Duration::from_secs(1),
        );
        let runner = TargetRunner::new(&config, &target);
        let err = runner.run().unwrap_err();
        assert!(matches!(
            err,
            RunError::Supervise(SuperviseError::Spawn(_))
        ));
    }

    #[test]
    fn target_name_comes_from_the_binary_base_name() {
        let target = FuzzTarget::new("proj", "/build/out/do_stuff_fuzzer", Duration::from_secs(1));
        assert_eq!(target.target_name(), "do_stuff_fuzzer");
        assert_eq!(target.project_name(), "proj");
    }
}
