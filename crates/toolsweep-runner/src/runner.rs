//! Deadline-bounded process execution.
//!
//! The child gets its own process group (unix), null stdin, and piped
//! stdout/stderr drained by reader threads. The runner polls for exit until
//! the deadline; on expiry it kills the whole process tree and waits a
//! bounded time to reap it. On a natural exit the child's process group is
//! swept so nothing it left behind outlives the run. A non-zero exit code is
//! data, not an error.

use std::io::{self, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::command::CommandSpec;
use crate::tree;

/// Default per-invocation deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on waiting for a killed process to be reaped.
pub const DEFAULT_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors that prevent a result from being produced at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to launch `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    WaitFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Deadlines for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Hard deadline for the command.
    pub timeout: Duration,
    /// Single bound covering the post-kill reap and output collection.
    pub reap_timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            reap_timeout: DEFAULT_REAP_TIMEOUT,
        }
    }
}

/// What one invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    /// Exit code. `None` on timeout or death by signal.
    pub exit_code: Option<i32>,
    /// Standard output followed by standard error, lossily decoded.
    pub output: String,
    /// Wall time from launch until the runner returned.
    pub elapsed: Duration,
    /// The deadline fired and the process tree was killed.
    pub timed_out: bool,
}

impl RawResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Runs one command under a deadline.
///
/// Implementations return `Err` only when the command could not be run at
/// all; every outcome of a launched process is a `RawResult`.
pub trait ProcessRunner {
    fn run(&self, cmd: &CommandSpec, limits: RunLimits) -> RunnerResult<RawResult>;
}

/// Runner backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner;

impl NativeRunner {
    pub const fn new() -> Self {
        Self
    }

    fn spawn(cmd: &CommandSpec) -> RunnerResult<Child> {
        let mut command = cmd.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|source| RunnerError::SpawnFailed {
            program: cmd.program.clone(),
            source,
        })
    }
}

impl ProcessRunner for NativeRunner {
    fn run(&self, cmd: &CommandSpec, limits: RunLimits) -> RunnerResult<RawResult> {
        let start = Instant::now();
        let mut child = Self::spawn(cmd)?;
        let pid = child.id();
        tracing::debug!(pid, command = %cmd.display(), "launched");

        let (done_tx, done_rx) = mpsc::channel();
        let stdout = OutputBuffer::drain(child.stdout.take(), done_tx.clone());
        let stderr = OutputBuffer::drain(child.stderr.take(), done_tx);

        let deadline = start + limits.timeout;
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {}
                Err(source) => {
                    tree::kill_tree(&mut child);
                    return Err(RunnerError::WaitFailed {
                        program: cmd.program.clone(),
                        source,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break None;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        };

        // Reaping and output collection share one bound
        let cleanup_deadline = Instant::now() + limits.reap_timeout;
        let status = if timed_out {
            tracing::debug!(
                pid,
                timeout_ms = limits.timeout.as_millis() as u64,
                "deadline reached, killing process tree"
            );
            let targeted = tree::kill_tree(&mut child);
            let status = reap(&mut child, cleanup_deadline);
            if status.is_none() {
                tracing::warn!(
                    pid,
                    reap_timeout_ms = limits.reap_timeout.as_millis() as u64,
                    "killed process was not reaped in time"
                );
            }
            let leaked = tree::survivors(&targeted);
            if !leaked.is_empty() {
                tracing::warn!(pid, leaked = ?leaked, "descendants survived kill");
            }
            status
        } else {
            // Background processes left by the tool would hold its pipes
            // and overlap the next invocation
            tree::sweep_group(pid);
            status
        };

        let pending = collect(&done_rx, 2, cleanup_deadline);
        if pending > 0 {
            tracing::warn!(pid, pending, "output pipes still open, keeping partial output");
        }

        let mut output = stdout.take();
        output.push_str(&stderr.take());

        Ok(RawResult {
            exit_code: if timed_out {
                None
            } else {
                status.and_then(|s| s.code())
            },
            output,
            elapsed: start.elapsed(),
            timed_out,
        })
    }
}

/// Poll a killed child until it is reaped or `deadline` passes.
fn reap(child: &mut Child, deadline: Instant) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "reap wait failed");
                return None;
            }
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Wait for up to `expected` reader threads to finish before `deadline`.
/// Returns how many did not.
fn collect(done: &Receiver<()>, expected: usize, deadline: Instant) -> usize {
    let mut remaining = expected;
    while remaining > 0 {
        let left = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(left) {
            Ok(()) => remaining -= 1,
            Err(RecvTimeoutError::Timeout) => break,
            // Both senders dropped: every reader has finished
            Err(RecvTimeoutError::Disconnected) => return 0,
        }
    }
    remaining
}

/// Bytes read so far from one pipe, shared with its reader thread.
#[derive(Clone, Default)]
struct OutputBuffer(Arc<Mutex<Vec<u8>>>);

impl OutputBuffer {
    /// Spawn a reader that appends `pipe` to a fresh buffer and signals
    /// `done` at EOF.
    fn drain<R: Read + Send + 'static>(pipe: Option<R>, done: mpsc::Sender<()>) -> Self {
        let buffer = Self::default();
        let sink = buffer.clone();
        thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = sink.0.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = done.send(());
        });
        buffer
    }

    fn take(&self) -> String {
        match self.0.lock() {
            Ok(mut buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned(),
            Err(_) => String::new(),
        }
    }
}
