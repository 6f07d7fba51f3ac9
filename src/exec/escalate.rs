// src/exec/escalate.rs

//! Termination escalation.
//!
//! [`kill`] walks the job's signal list from mildest to strongest, pausing
//! after each delivery, and stops at the first one that leaves the process
//! dead. [`terminate`] is the single mild attempt used by `close`.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::shared::JobShared;
use crate::errors::JobError;

/// Pause after each signal before checking whether the process died.
pub const SIGNAL_SETTLE: Duration = Duration::from_millis(100);

/// A termination request, mapped to the platform's primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    Terminate,
    Quit,
    Kill,
}

impl KillSignal {
    #[cfg(unix)]
    pub fn as_signal(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal;

        match self {
            KillSignal::Terminate => Signal::SIGTERM,
            KillSignal::Quit => Signal::SIGQUIT,
            KillSignal::Kill => Signal::SIGKILL,
        }
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KillSignal::Terminate => "SIGTERM",
            KillSignal::Quit => "SIGQUIT",
            KillSignal::Kill => "SIGKILL",
        };
        f.write_str(name)
    }
}

/// Platform escalation order: TERM, QUIT, KILL on Unix; a single forced stop
/// elsewhere.
pub fn default_kill_signals() -> Vec<KillSignal> {
    if cfg!(unix) {
        vec![KillSignal::Terminate, KillSignal::Quit, KillSignal::Kill]
    } else {
        vec![KillSignal::Kill]
    }
}

/// What [`kill`] does when the signal list runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Record the failure and return it.
    #[default]
    Raise,
    /// Record the failure only.
    Record,
}

/// Escalate through the job's signal list until the process dies.
///
/// On exhaustion the job is aborted and an unable-to-kill failure is
/// recorded; `policy` decides whether it is also returned.
pub(crate) async fn kill(shared: &JobShared, policy: ErrorPolicy) -> Result<(), JobError> {
    let mut last_error: Option<io::Error> = None;

    for &signal in shared.kill_signals.iter() {
        if !shared.is_alive() {
            return Ok(());
        }
        match shared.send_signal(signal) {
            Ok(()) => {}
            Err(err) if is_already_gone(&err) => {
                debug!(job = %shared.name, %signal, "process already gone");
                return Ok(());
            }
            Err(err) => {
                warn!(job = %shared.name, %signal, error = %err, "failed to deliver signal");
                last_error = Some(err);
                continue;
            }
        }

        sleep(SIGNAL_SETTLE).await;
        if !shared.is_alive() {
            info!(job = %shared.name, %signal, "job killed");
            return Ok(());
        }
        debug!(job = %shared.name, %signal, "job survived signal; escalating");
    }

    shared.abort.cancel();
    warn!(job = %shared.name, pid = ?shared.pid, "unable to kill job; abort switch set");

    let message = match last_error {
        Some(err) => format!("unable to kill job: {err}"),
        None => {
            let names: Vec<String> = shared.kill_signals.iter().map(|s| s.to_string()).collect();
            format!("signals {} failed", names.join(", "))
        }
    };
    let error = shared.record_failure("escalator", JobError::UnableToKill(message));

    match policy {
        ErrorPolicy::Raise => Err(error),
        ErrorPolicy::Record => Ok(()),
    }
}

/// Deliver only the mildest signal, then give the process a moment.
pub(crate) async fn terminate(shared: &JobShared) {
    if !shared.is_alive() {
        return;
    }
    let Some(&signal) = shared.kill_signals.first() else {
        return;
    };
    match shared.send_signal(signal) {
        Ok(()) => sleep(SIGNAL_SETTLE).await,
        Err(err) if is_already_gone(&err) => {}
        Err(err) => warn!(job = %shared.name, %signal, error = %err, "terminate failed"),
    }
}

#[cfg(unix)]
fn is_already_gone(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == nix::libc::ESRCH || code == nix::libc::ECHILD
    )
}

#[cfg(not(unix))]
fn is_already_gone(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}
