// src/exec/backend.rs

//! Pluggable process-spawning backends.
//!
//! The job façade talks to a `Backend` instead of building processes itself.
//! Both backends hand back the same [`Spawned`] bundle, so everything after
//! spawn (bridge tasks, signals, liveness) is written once.
//!
//! - [`PipeBackend`] redirects stdin/stdout/stderr through three pipes.
//! - [`super::pty::PtyBackend`] (Unix only) gives the child a controlling
//!   pseudo-terminal on stdin/stdout so the parent can observe the terminal's
//!   echo flag, and keeps stderr on a separate pipe.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::errors::JobError;

#[cfg(unix)]
pub use super::pty::{EchoProbe, PtyBackend};

pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;
pub type InputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// What to start.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub cwd: Option<&'a Path>,
    /// Complete environment for the child.
    pub env: &'a BTreeMap<String, String>,
}

/// A started child plus the stream ends the bridge tasks need.
pub struct Spawned {
    pub child: Child,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub stdin: InputStream,
    /// Terminal handle for echo detection; `None` for pipe mode.
    pub terminal: Option<EchoProbe>,
}

/// Strategy for creating a child process.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start the process. An `Err` means it never ran.
    fn spawn(&self, request: &SpawnRequest<'_>) -> io::Result<Spawned>;
}

/// Pick the backend for the requested mode.
pub fn select_backend(pty: bool) -> Result<Box<dyn Backend>, JobError> {
    if !pty {
        return Ok(Box::new(PipeBackend));
    }

    #[cfg(unix)]
    {
        Ok(Box::new(PtyBackend))
    }
    #[cfg(not(unix))]
    {
        Err(JobError::Config(
            "pty mode is not supported on this platform".to_string(),
        ))
    }
}

/// Command with program, arguments, working directory and the exact
/// environment from `request` applied.
pub(crate) fn base_command(request: &SpawnRequest<'_>) -> Command {
    let mut cmd = Command::new(request.program);
    cmd.args(request.args)
        .env_clear()
        .envs(request.env)
        .kill_on_drop(true);
    if let Some(cwd) = request.cwd {
        cmd.current_dir(cwd);
    }
    cmd
}

pub(crate) fn missing_pipe(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("child {name} pipe unavailable"))
}

/// Three plain pipes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeBackend;

impl Backend for PipeBackend {
    fn name(&self) -> &'static str {
        "pipe"
    }

    fn spawn(&self, request: &SpawnRequest<'_>) -> io::Result<Spawned> {
        let mut child = base_command(request)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        Ok(Spawned {
            child,
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            stdin: Box::new(stdin),
            terminal: None,
        })
    }
}

/// Placeholder so [`Spawned`] has the same shape on every platform.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct EchoProbe {
    _private: (),
}

#[cfg(not(unix))]
impl EchoProbe {
    pub fn echo_enabled(&self) -> io::Result<bool> {
        Ok(true)
    }

    pub fn is_tty(&self) -> bool {
        false
    }
}
