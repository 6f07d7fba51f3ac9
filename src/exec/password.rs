// src/exec/password.rs

//! Password injection.
//!
//! In pipe mode there is no way to tell when a prompt is up, so all secrets
//! are written in one go after a short delay. In pty mode each secret waits
//! until the terminal's echo flag drops (the usual sign that a program is
//! reading a password). Once all secrets are sent the echo flag is watched
//! for a settle period: a program that is still prompting at the end of it
//! did not accept them.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::backend::EchoProbe;
use super::escalate::{self, ErrorPolicy};
use super::shared::JobShared;
use crate::errors::JobError;
use crate::types::{Chunk, StreamName};

/// Password sub-timeout used when none is given and there is no overall
/// timeout to derive one from.
pub const DEFAULT_PASSWORD_TIMEOUT: Duration = Duration::from_secs(90);

/// Timing knobs for password injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Interval between echo-flag checks while waiting for a prompt.
    pub poll_interval: Duration,
    /// Longest wait after the last secret for echo to come back on.
    pub settle: Duration,
    /// Delay before writing secrets in pipe mode.
    pub pipe_delay: Duration,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle: Duration::from_secs(5),
            pipe_delay: Duration::from_millis(100),
        }
    }
}

/// `password_timeout` if given, else a tenth of the overall timeout capped at
/// [`DEFAULT_PASSWORD_TIMEOUT`].
pub fn effective_password_timeout(
    password_timeout: Option<Duration>,
    timeout: Option<Duration>,
) -> Duration {
    match (password_timeout, timeout) {
        (Some(explicit), _) => explicit,
        (None, Some(overall)) => DEFAULT_PASSWORD_TIMEOUT.min(overall / 10),
        (None, None) => DEFAULT_PASSWORD_TIMEOUT,
    }
}

enum PromptWait {
    Ready,
    Died,
    TimedOut,
    Aborted,
}

pub(crate) struct PasswordInjector<'a> {
    shared: &'a JobShared,
    policy: PasswordPolicy,
    password_timeout: Duration,
    /// End of the overall timeout, if there is one.
    deadline: Option<Instant>,
}

impl<'a> PasswordInjector<'a> {
    pub fn new(
        shared: &'a JobShared,
        policy: PasswordPolicy,
        password_timeout: Duration,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            shared,
            policy,
            password_timeout,
            deadline,
        }
    }

    /// Pipe mode: everything at once, no feedback.
    pub async fn inject_piped(&self, secrets: &[String]) {
        sleep(self.policy.pipe_delay).await;
        let payload: Vec<u8> = secrets
            .iter()
            .flat_map(|secret| terminated(secret))
            .collect();
        debug!(
            job = %self.shared.name,
            secrets = secrets.len(),
            len = payload.len(),
            "writing passwords to pipe"
        );
        self.shared.input.push(Chunk::Data(payload));
    }

    /// Pty mode: one secret per prompt, then check that prompting stopped.
    ///
    /// Failures are recorded on the job before being returned.
    pub async fn inject_pty(&self, probe: &EchoProbe, secrets: &[String]) -> Result<(), JobError> {
        for (index, secret) in secrets.iter().enumerate() {
            match self.wait_for_prompt(probe).await? {
                PromptWait::Ready => {}
                PromptWait::Aborted => return Ok(()),
                // Already explained by whatever killed it (e.g. the deadman).
                PromptWait::Died if self.shared.has_failures() => return Ok(()),
                PromptWait::Died => {
                    return Err(self.shared.record_failure(
                        "password injector",
                        JobError::Execution(format!(
                            "job died while waiting for password prompt {}",
                            index + 1
                        )),
                    ));
                }
                PromptWait::TimedOut => {
                    warn!(job = %self.shared.name, timeout = ?self.password_timeout, "password prompt not seen");
                    let error = self.shared.record_failure(
                        "password injector",
                        JobError::Timeout("Password prompt not seen.".to_string()),
                    );
                    escalate::kill(self.shared, ErrorPolicy::Record).await?;
                    return Err(error);
                }
            }

            debug!(job = %self.shared.name, index, len = secret.len(), "prompt ready; sending password");
            self.shared.input.push(Chunk::Data(terminated(secret)));
        }

        self.confirm_accepted(probe).await
    }

    async fn wait_for_prompt(&self, probe: &EchoProbe) -> Result<PromptWait, JobError> {
        let give_up = Instant::now() + self.password_timeout;

        loop {
            if self.shared.abort.is_cancelled() {
                return Ok(PromptWait::Aborted);
            }
            if !self.shared.is_alive() {
                return Ok(PromptWait::Died);
            }
            match probe.echo_enabled() {
                Ok(false) => return Ok(PromptWait::Ready),
                Ok(true) => {}
                Err(err) => {
                    if !self.shared.is_alive() {
                        return Ok(PromptWait::Died);
                    }
                    return Err(self
                        .shared
                        .record_failure("password injector", JobError::io("reading terminal echo flag", err)));
                }
            }
            if Instant::now() >= give_up {
                return Ok(PromptWait::TimedOut);
            }

            tokio::select! {
                _ = self.shared.abort.cancelled() => return Ok(PromptWait::Aborted),
                _ = sleep(self.policy.poll_interval) => {}
            }
        }
    }

    /// After the last secret: poll the echo flag until it comes back on or
    /// the job exits. If echo is still off once the settle period is over,
    /// the program is asking again.
    async fn confirm_accepted(&self, probe: &EchoProbe) -> Result<(), JobError> {
        let settle = self.settle_period();
        let give_up = Instant::now() + settle;
        debug!(job = %self.shared.name, ?settle, "waiting for password to be accepted");

        loop {
            if self.shared.abort.is_cancelled() || !self.shared.is_alive() {
                return Ok(());
            }
            match probe.echo_enabled() {
                Ok(true) => {
                    info!(job = %self.shared.name, "passwords accepted");
                    return Ok(());
                }
                Ok(false) => {}
                Err(err) if !self.shared.is_alive() => {
                    debug!(job = %self.shared.name, error = %err, "job exited during settle check");
                    return Ok(());
                }
                Err(err) => {
                    return Err(self
                        .shared
                        .record_failure("password injector", JobError::io("reading terminal echo flag", err)));
                }
            }

            let now = Instant::now();
            if now >= give_up {
                break;
            }
            tokio::select! {
                _ = self.shared.abort.cancelled() => return Ok(()),
                _ = sleep(self.policy.poll_interval.min(give_up - now)) => {}
            }
        }

        warn!(job = %self.shared.name, "still prompting after all passwords were sent");
        self.shared
            .append(StreamName::Stderr, b"Invalid/too few passwords\n".to_vec());
        let error = self.shared.record_failure(
            "password injector",
            JobError::FailedPassword("Invalid/too few passwords".to_string()),
        );
        escalate::kill(self.shared, ErrorPolicy::Record).await?;
        Err(error)
    }

    /// Settle period, never longer than the password timeout or the time left
    /// before the overall deadline.
    fn settle_period(&self) -> Duration {
        let bounded = self.policy.settle.min(self.password_timeout);
        match self.deadline {
            Some(deadline) => bounded.min(deadline.saturating_duration_since(Instant::now())),
            None => bounded,
        }
    }
}

fn terminated(secret: &str) -> Vec<u8> {
    let mut bytes = secret.as_bytes().to_vec();
    if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_password_timeout_wins() {
        let got = effective_password_timeout(
            Some(Duration::from_secs(3)),
            Some(Duration::from_secs(10)),
        );
        assert_eq!(got, Duration::from_secs(3));
    }

    #[test]
    fn derived_password_timeout_is_a_tenth_of_overall() {
        let got = effective_password_timeout(None, Some(Duration::from_secs(20)));
        assert_eq!(got, Duration::from_secs(2));

        let capped = effective_password_timeout(None, Some(Duration::from_secs(3600)));
        assert_eq!(capped, DEFAULT_PASSWORD_TIMEOUT);

        assert_eq!(effective_password_timeout(None, None), DEFAULT_PASSWORD_TIMEOUT);
    }

    #[test]
    fn secrets_are_newline_terminated_once() {
        assert_eq!(terminated("abc"), b"abc\n".to_vec());
        assert_eq!(terminated("abc\n"), b"abc\n".to_vec());
    }
}
