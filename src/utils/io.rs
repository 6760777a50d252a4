//! Background capture of child-process output.
//!
//! Draining a supervised child's pipes must never block the supervising
//! thread, so reads happen on a dedicated single-thread tokio runtime and
//! accumulate into a shared buffer the caller collects later.

use std::fs::File;
use std::future::pending;
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex, Once};
use std::thread::sleep;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::runtime::{Builder, Runtime};

/// Starts collecting everything readable from `f` without blocking the
/// caller.
pub fn read_background<T: IntoRawFd>(f: T) -> BackgroundIoHandle {
    let fd = f.into_raw_fd();
    let f = unsafe { File::from_raw_fd(fd) };
    let mut f = tokio::fs::File::from_std(f);
    let buf = Arc::new(Mutex::new(Vec::with_capacity(1024)));
    let finished = Arc::new(AtomicBool::new(false));
    let task_buf = Arc::clone(&buf);
    let task_finished = Arc::clone(&finished);

    runtime().spawn(async move {
        let mut chunk = [0_u8; 4096];
        while let Ok(sz) = f.read(&mut chunk).await {
            if sz == 0 {
                break;
            }
            task_buf.lock().unwrap().extend(&chunk[..sz]);
        }
        task_finished.store(true, Ordering::Relaxed);
    });

    BackgroundIoHandle { buf, finished }
}

/// Handle over output being collected in the background.
pub struct BackgroundIoHandle {
    buf: Arc<Mutex<Vec<u8>>>,
    finished: Arc<AtomicBool>,
}

impl BackgroundIoHandle {
    /// Takes everything collected so far.
    pub fn current_data(&self) -> Vec<u8> {
        let mut buf = self.buf.lock().unwrap();
        buf.split_off(0)
    }

    /// Waits for the source to reach EOF (the writing process exited or was
    /// killed), then returns the full collected output.
    pub fn wait_finish(self) -> Vec<u8> {
        while !self.finished.load(Ordering::Relaxed) {
            sleep(Duration::from_millis(1));
        }
        self.current_data()
    }
}

lazy_static! {
    static ref RUNTIME: Runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build background io runtime");
}

static DRIVER: Once = Once::new();

/// The shared background-io runtime, driven by its own thread.
pub fn runtime() -> &'static Runtime {
    DRIVER.call_once(|| {
        let barrier = Arc::new(Barrier::new(2));
        let ready = Arc::clone(&barrier);
        std::thread::Builder::new()
            .name("fuzzci-bg-io".into())
            .spawn(move || {
                RUNTIME.block_on(async move {
                    ready.wait();
                    pending::<()>().await
                })
            })
            .expect("failed to spawn background io thread");
        // A current-thread runtime is driven by whichever thread calls
        // block_on first. Wait until the dedicated thread owns that job so
        // no caller of runtime() can steal it.
        barrier.wait();
    });
    &RUNTIME
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn collects_child_output_to_eof() {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("echo one; echo two")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let handle = read_background(child.stdout.take().unwrap());
        child.wait().unwrap();
        let data = handle.wait_finish();
        assert_eq!(data, b"one\ntwo\n");
    }

    #[test]
    fn wait_finish_returns_after_writer_is_killed() {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg("echo partial; exec sleep 30")
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let handle = read_background(child.stdout.take().unwrap());
        sleep(Duration::from_millis(200));
        child.kill().unwrap();
        child.wait().unwrap();
        let data = handle.wait_finish();
        assert_eq!(data, b"partial\n");
    }
}
