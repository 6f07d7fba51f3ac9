// src/exec/shared.rs

//! State shared between a job's controlling call and its worker tasks.
//!
//! Workers only touch the two queues, the abort token and the lock-protected
//! [`IoState`] (accumulated output + failure log). Process status is kept
//! under its own lock and is written exactly once, by whichever caller first
//! observes the exit.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::escalate::KillSignal;
use super::failures::FailureLog;
use super::queue::ChunkQueue;
use crate::errors::JobError;
use crate::types::{Chunk, JobStatus, StreamName};

/// Accumulated output and recorded failures. One lock guards all of it.
#[derive(Debug, Default)]
pub(crate) struct IoState {
    pub stdout: Vec<Vec<u8>>,
    pub stderr: Vec<Vec<u8>>,
    pub failures: FailureLog,
}

#[derive(Debug, Default)]
struct ExitState {
    terminated: bool,
    status: Option<JobStatus>,
}

#[derive(Debug)]
pub(crate) struct JobShared {
    pub name: String,
    pub pid: Option<u32>,
    pub abort: CancellationToken,
    pub output: ChunkQueue<(StreamName, Chunk)>,
    pub input: ChunkQueue<Chunk>,
    pub kill_signals: Arc<[KillSignal]>,
    child: Mutex<Option<Child>>,
    exit: Mutex<ExitState>,
    io: Mutex<IoState>,
    open_streams: AtomicUsize,
}

impl JobShared {
    pub fn new(name: String, child: Option<Child>, kill_signals: Arc<[KillSignal]>) -> Self {
        let pid = child.as_ref().and_then(Child::id);
        let exit = ExitState {
            terminated: child.is_none(),
            status: None,
        };
        Self {
            name,
            pid,
            abort: CancellationToken::new(),
            output: ChunkQueue::new(),
            input: ChunkQueue::new(),
            kill_signals,
            child: Mutex::new(child),
            exit: Mutex::new(exit),
            io: Mutex::new(IoState::default()),
            open_streams: AtomicUsize::new(2),
        }
    }

    fn io(&self) -> MutexGuard<'_, IoState> {
        self.io.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn exit(&self) -> MutexGuard<'_, ExitState> {
        self.exit.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a chunk to the matching accumulation buffer.
    pub fn append(&self, stream: StreamName, data: Vec<u8>) {
        let mut io = self.io();
        match stream {
            StreamName::Stdout => io.stdout.push(data),
            StreamName::Stderr => io.stderr.push(data),
        }
    }

    /// Record a failure and return a copy of it.
    #[track_caller]
    pub fn record_failure(&self, origin: &'static str, error: JobError) -> JobError {
        debug!(job = %self.name, origin, error = %error, "recording job failure");
        self.io().failures.record(origin, error)
    }

    pub fn failures(&self) -> FailureLog {
        self.io().failures.clone()
    }

    pub fn has_failures(&self) -> bool {
        !self.io().failures.is_empty()
    }

    pub fn raise_if_exceptions(&self) -> Result<(), JobError> {
        self.io().failures.to_result()
    }

    /// Join the accumulated chunks into final strings, `\r\n` folded to `\n`.
    pub fn render_output(&self) -> (String, String) {
        let io = self.io();
        (render(&io.stdout), render(&io.stderr))
    }

    /// Output streams that have not delivered their end-marker yet.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Count one output stream as finished; returns how many remain.
    pub fn stream_closed(&self) -> usize {
        let previous = self
            .open_streams
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn terminated(&self) -> bool {
        self.exit().terminated
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.exit().status
    }

    /// Non-blocking liveness probe. The first call that sees the process gone
    /// records its status.
    pub fn is_alive(&self) -> bool {
        if self.terminated() {
            return false;
        }

        let mut guard = self.child.lock().unwrap_or_else(|p| p.into_inner());
        let Some(child) = guard.as_mut() else {
            self.exit().terminated = true;
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                let status = job_status(status);
                let mut exit = self.exit();
                if !exit.terminated {
                    info!(job = %self.name, pid = ?self.pid, ?status, "job process exited");
                    exit.terminated = true;
                    exit.status = Some(status);
                }
                false
            }
            Err(err) if err.raw_os_error() == Some(no_child_errno()) => {
                debug!(job = %self.name, "child already reaped");
                self.exit().terminated = true;
                false
            }
            Err(err) => {
                warn!(job = %self.name, error = %err, "failed to query job status");
                self.record_failure("liveness", JobError::io("waiting for child", err));
                false
            }
        }
    }

    /// Deliver one termination signal to the process.
    pub fn send_signal(&self, signal: KillSignal) -> io::Result<()> {
        debug!(job = %self.name, pid = ?self.pid, %signal, "sending signal");
        deliver(self, signal)
    }
}

#[cfg(unix)]
fn deliver(shared: &JobShared, signal: KillSignal) -> io::Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pid = shared
        .pid
        .ok_or_else(|| io::Error::from_raw_os_error(nix::libc::ESRCH))?;
    let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    kill(Pid::from_raw(pid), signal.as_signal()).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn deliver(shared: &JobShared, _signal: KillSignal) -> io::Result<()> {
    let mut guard = shared.child.lock().unwrap_or_else(|p| p.into_inner());
    match guard.as_mut() {
        Some(child) => child.start_kill(),
        None => Err(io::Error::new(io::ErrorKind::NotFound, "no child process")),
    }
}

#[cfg(unix)]
fn no_child_errno() -> i32 {
    nix::libc::ECHILD
}

#[cfg(not(unix))]
fn no_child_errno() -> i32 {
    -1
}

#[cfg(unix)]
fn job_status(status: std::process::ExitStatus) -> JobStatus {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => JobStatus::Exited(code),
        (None, Some(signal)) => JobStatus::Signaled(signal),
        (None, None) => JobStatus::Exited(-1),
    }
}

#[cfg(not(unix))]
fn job_status(status: std::process::ExitStatus) -> JobStatus {
    JobStatus::Exited(status.code().unwrap_or(-1))
}

fn render(chunks: &[Vec<u8>]) -> String {
    String::from_utf8_lossy(&chunks.concat()).replace("\r\n", "\n")
}
