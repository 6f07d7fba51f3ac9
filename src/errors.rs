// src/errors.rs

//! Crate-wide error types.
//!
//! - [`JobError`] is the failure taxonomy of a single job. Worker tasks record
//!   values of this type into the job's failure log; the controlling call turns
//!   the log back into a single `JobError`.
//! - [`ExecuteError`] is what [`crate::run`] returns: the job error plus the
//!   output the job managed to collect before it failed.
//! - [`JobrunnerError`] covers the plumbing around jobs (job files, CLI).

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Classification of a [`JobError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Launch,
    Timeout,
    FailedPassword,
    UnableToKill,
    Io,
    Execution,
    Config,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Launch => "LaunchError",
            FailureKind::Timeout => "TimeoutError",
            FailureKind::FailedPassword => "FailedPassword",
            FailureKind::UnableToKill => "UnableToKillJob",
            FailureKind::Io => "IoError",
            FailureKind::Execution => "ExecuteError",
            FailureKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong while running a job.
///
/// `JobError` is `Clone` so the same failure can sit in the failure log and be
/// handed back to the caller; OS errors are shared behind an `Arc` for that.
#[derive(Error, Debug, Clone)]
pub enum JobError {
    /// The executable could not be found or started.
    #[error("{program} --> {source}")]
    Launch {
        program: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The deadman timer fired, or a password prompt never showed up.
    #[error("{0}")]
    Timeout(String),

    /// Secrets were rejected or there were too few of them.
    #[error("{0}")]
    FailedPassword(String),

    /// Every termination signal was delivered and the process is still alive.
    #[error("{0}")]
    UnableToKill(String),

    /// Unexpected OS error in a reader or writer.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    /// The process misbehaved in a way not covered above (e.g. died while a
    /// password was pending).
    #[error("{0}")]
    Execution(String),

    /// Invalid option combination; never stored in the failure log.
    #[error("configuration error: {0}")]
    Config(String),

    /// Several failures were recorded; `details` lists all of them in order.
    #[error("{details}")]
    Composite { kind: FailureKind, details: String },
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Launch { .. } => FailureKind::Launch,
            JobError::Timeout(_) => FailureKind::Timeout,
            JobError::FailedPassword(_) => FailureKind::FailedPassword,
            JobError::UnableToKill(_) => FailureKind::UnableToKill,
            JobError::Io { .. } => FailureKind::Io,
            JobError::Execution(_) => FailureKind::Execution,
            JobError::Config(_) => FailureKind::Config,
            JobError::Composite { kind, .. } => *kind,
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        JobError::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn launch(program: impl Into<String>, source: io::Error) -> Self {
        JobError::Launch {
            program: program.into(),
            source: Arc::new(source),
        }
    }
}

/// Snapshot of a job's observable state, attached to [`ExecuteError`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    pub name: String,
    /// `None` when the process never started.
    pub pid: Option<u32>,
    pub stdout: String,
    pub stderr: String,
    pub returncode: Option<i32>,
    pub signal: Option<i32>,
    pub terminated: bool,
    pub closed: bool,
}

impl fmt::Display for JobOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            return Ok(());
        }
        write!(f, "\n  command: {}", self.name)?;
        if let Some(code) = self.returncode {
            write!(f, " (returncode {code})")?;
        }
        if let Some(signal) = self.signal {
            write!(f, " (killed by signal {signal})")?;
        }
        for (label, text) in [("stdout", &self.stdout), ("stderr", &self.stderr)] {
            if text.trim().is_empty() {
                continue;
            }
            write!(f, "\n  {label}:")?;
            for line in text.lines() {
                write!(f, "\n    {line}")?;
            }
        }
        Ok(())
    }
}

/// Error returned by [`crate::run`]: the failure plus the job's output.
#[derive(Error, Debug)]
#[error("{error}{output}")]
pub struct ExecuteError {
    #[source]
    pub error: JobError,
    pub output: JobOutput,
}

impl ExecuteError {
    pub fn new(error: JobError, output: JobOutput) -> Self {
        Self { error, output }
    }

    /// For failures raised before any process existed.
    pub fn without_job(error: JobError) -> Self {
        Self {
            error,
            output: JobOutput::default(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

/// Errors from the surrounding plumbing: job files and the CLI.
#[derive(Error, Debug)]
pub enum JobrunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, JobrunnerError>;
