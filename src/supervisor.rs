//! Bounded-time supervision of one child process.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::{setsid, Pid};
use thiserror::Error;

/// Default liveness poll interval. The deadline is enforced with at most this
/// much slack.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal state of one supervised execution.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The child exited on its own before the deadline.
    Completed(ExitStatus),
    /// The child was still alive at the deadline; it has been killed and
    /// reaped.
    TimedOut,
}

#[derive(Debug, Error)]
pub enum SuperviseError {
    /// The child process could not be created at all.
    #[error("spawn: {0}")]
    Spawn(io::Error),
    /// Waiting on an already spawned child failed.
    #[error("wait: {0}")]
    Wait(io::Error),
}

/// Runs one command as a child process for a bounded wall-clock duration,
/// killing it if it is still alive at the deadline.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    poll_interval: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ProcessSupervisor {
    pub fn new(poll_interval: Duration) -> Self {
        assert!(!poll_interval.is_zero(), "poll interval must be non-zero");
        Self { poll_interval }
    }

    /// Runs `cmd` for at most `timeout`.
    ///
    /// `attach` is called exactly once, right after a successful spawn, so
    /// the caller can take the child's pipes or start a monitor thread; its
    /// return value is handed back together with the outcome. On every
    /// return path the child has fully exited and been reaped.
    pub fn run<F, T>(
        &self,
        cmd: &mut Command,
        timeout: Duration,
        attach: F,
    ) -> Result<(ProcessOutcome, T), SuperviseError>
    where
        F: FnOnce(&mut Child) -> T,
    {
        unsafe {
            cmd.pre_exec(|| {
                // Give the child its own session so it cannot be taken down
                // with the supervisor's terminal group.
                let _ = setsid();
                Ok(())
            });
        }
        let mut child = cmd.spawn().map_err(SuperviseError::Spawn)?;
        let attached = attach(&mut child);

        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok((ProcessOutcome::Completed(status), attached)),
                Ok(None) => {}
                Err(e) => {
                    kill_group(&mut child);
                    let _ = child.wait();
                    return Err(SuperviseError::Wait(e));
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(self.poll_interval);
        }

        // Deadline hit: terminate unconditionally, then reap before
        // returning so no zombie is left behind.
        kill_group(&mut child);
        child.wait().map_err(SuperviseError::Wait)?;
        Ok((ProcessOutcome::TimedOut, attached))
    }
}

/// The child is its own session leader, so its pid doubles as the group id.
/// Killing the group takes down grandchildren too, which would otherwise
/// keep the child's output pipes open past the deadline.
fn kill_group(child: &mut Child) {
    let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    // Direct kill as well, in case setsid failed and the pid is not a
    // group of its own.
    let _ = child.kill();
}
