// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] starts the child on pipes or (Unix) a pseudo-terminal.
//! - [`bridge`] runs the reader, writer and dispatcher tasks.
//! - [`password`] answers password prompts.
//! - [`watchdog`] kills jobs that overrun their timeout.
//! - [`escalate`] walks the termination signal list.
//! - [`job`] ties it together behind the [`Job`] façade.

pub mod backend;
pub mod bridge;
pub mod escalate;
pub mod failures;
pub mod job;
pub mod options;
pub mod password;
#[cfg(unix)]
pub mod pty;
pub mod queue;
mod shared;
mod watchdog;

pub use backend::{Backend, EchoProbe, PipeBackend, select_backend};
#[cfg(unix)]
pub use backend::PtyBackend;
pub use escalate::{ErrorPolicy, KillSignal, SIGNAL_SETTLE, default_kill_signals};
pub use failures::{Failure, FailureLog};
pub use job::Job;
pub use options::{CommunicateOptions, DEFAULT_INPUT_DELAY, RunOptions, SpawnOptions};
pub use password::{DEFAULT_PASSWORD_TIMEOUT, PasswordPolicy, effective_password_timeout};
pub use queue::ChunkQueue;
