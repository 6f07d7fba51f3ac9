// src/exec/watchdog.rs

//! Deadman timer: kills the job unless disarmed before the timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::escalate::{self, ErrorPolicy};
use super::shared::JobShared;
use crate::errors::JobError;
use crate::types::StreamName;

/// An armed deadman timer.
///
/// - `cancel` stops the timer if it has not fired yet.
/// - `handle` is awaited by [`Deadman::disarm`] so no late firing can happen
///   once the job's resources are released.
pub(crate) struct Deadman {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Deadman {
    pub fn arm(shared: Arc<JobShared>, timeout: Duration) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(timeout) => fire(&shared, timeout).await,
                _ = cancel_rx => {
                    debug!(job = %shared.name, "deadman switch cancelled");
                }
            }
        });

        Self {
            cancel: Some(cancel_tx),
            handle,
        }
    }

    /// Cancel the timer and wait until its task is gone.
    pub async fn disarm(mut self) {
        if let Some(cancel) = self.cancel.take() {
            // Err means the timer already fired and dropped its receiver.
            let _ = cancel.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            warn!(error = %err, "deadman task did not finish cleanly");
        }
    }
}

async fn fire(shared: &JobShared, timeout: Duration) {
    if !shared.is_alive() {
        debug!(job = %shared.name, "deadman expired after the job exited; ignoring");
        return;
    }

    let message = format!(
        "TIMEOUT: process failed to complete in {} seconds",
        timeout.as_secs_f64()
    );
    warn!(job = %shared.name, pid = ?shared.pid, ?timeout, "job timed out; killing");

    shared.append(StreamName::Stderr, format!("\n{message}\n").into_bytes());
    shared.record_failure("deadman", JobError::Timeout(message));

    if let Err(err) = escalate::kill(shared, ErrorPolicy::Record).await {
        debug!(job = %shared.name, error = %err, "kill after timeout failed");
    }
}
