// src/exec/options.rs

//! Knobs for spawning and driving a job.
//!
//! - [`SpawnOptions`] is everything needed to start the process.
//! - [`CommunicateOptions`] is everything `communicate` does with it.
//! - [`RunOptions`] bundles both for [`crate::run`], with builder-style
//!   setters.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::escalate::{KillSignal, default_kill_signals};
use super::password::{PasswordPolicy, effective_password_timeout};
use crate::errors::JobError;
use crate::types::Interactive;

/// Delay before caller input is written, giving the program time to start
/// reading.
pub const DEFAULT_INPUT_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub cwd: Option<PathBuf>,
    /// Run on a pseudo-terminal instead of pipes.
    pub pty: bool,
    /// Base environment; `None` copies the current process environment.
    pub env: Option<BTreeMap<String, String>>,
    /// Layered on top of the base environment.
    pub extra_env: BTreeMap<String, String>,
    /// Escalation order used by `kill`.
    pub kill_signals: Arc<[KillSignal]>,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            pty: false,
            env: None,
            extra_env: BTreeMap::new(),
            kill_signals: default_kill_signals().into(),
        }
    }
}

impl SpawnOptions {
    /// The exact environment the child will see.
    pub fn merged_env(&self) -> BTreeMap<String, String> {
        let mut env = match &self.env {
            Some(base) => base.clone(),
            // Variables that are not valid UTF-8 are skipped.
            None => std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        };
        env.extend(
            self.extra_env
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        env
    }
}

#[derive(Debug, Clone)]
pub struct CommunicateOptions {
    pub input: Option<Vec<u8>>,
    pub input_delay: Duration,
    /// Secrets, sent in order, before any `input`.
    pub passwords: Vec<String>,
    pub password_timeout: Option<Duration>,
    /// Overall wall-clock limit, enforced by the deadman timer.
    pub timeout: Option<Duration>,
    pub interactive: Interactive,
    /// Pipe mode: end stdin once passwords and input are written.
    pub close_stdin: bool,
    pub password_policy: PasswordPolicy,
}

impl Default for CommunicateOptions {
    fn default() -> Self {
        Self {
            input: None,
            input_delay: DEFAULT_INPUT_DELAY,
            passwords: Vec::new(),
            password_timeout: None,
            timeout: None,
            interactive: Interactive::Off,
            close_stdin: true,
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl CommunicateOptions {
    /// A password timeout must be strictly shorter than the overall timeout.
    pub fn validate(&self) -> Result<(), JobError> {
        check_timeouts(self.timeout, self.password_timeout)
    }

    pub fn effective_password_timeout(&self) -> Duration {
        effective_password_timeout(self.password_timeout, self.timeout)
    }
}

pub(crate) fn check_timeouts(
    timeout: Option<Duration>,
    password_timeout: Option<Duration>,
) -> Result<(), JobError> {
    match (timeout, password_timeout) {
        (Some(timeout), Some(password_timeout)) if password_timeout >= timeout => {
            Err(JobError::Config(format!(
                "password_timeout ({}s) must be less than timeout ({}s)",
                password_timeout.as_secs_f64(),
                timeout.as_secs_f64()
            )))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub spawn: SpawnOptions,
    pub communicate: CommunicateOptions,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.spawn.cwd = Some(cwd.into());
        self
    }

    pub fn with_pty(mut self, pty: bool) -> Self {
        self.spawn.pty = pty;
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.spawn.env = Some(env);
        self
    }

    pub fn with_extra_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spawn.extra_env.insert(key.into(), value.into());
        self
    }

    pub fn with_kill_signals(mut self, signals: impl Into<Arc<[KillSignal]>>) -> Self {
        self.spawn.kill_signals = signals.into();
        self
    }

    pub fn with_input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.communicate.input = Some(input.into());
        self
    }

    pub fn with_input_delay(mut self, delay: Duration) -> Self {
        self.communicate.input_delay = delay;
        self
    }

    pub fn with_password(mut self, secret: impl Into<String>) -> Self {
        self.communicate.passwords.push(secret.into());
        self
    }

    pub fn with_passwords<I, S>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.communicate
            .passwords
            .extend(secrets.into_iter().map(Into::into));
        self
    }

    pub fn with_password_timeout(mut self, timeout: Duration) -> Self {
        self.communicate.password_timeout = Some(timeout);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.communicate.timeout = Some(timeout);
        self
    }

    pub fn with_interactive(mut self, interactive: Interactive) -> Self {
        self.communicate.interactive = interactive;
        self
    }

    pub fn with_close_stdin(mut self, close: bool) -> Self {
        self.communicate.close_stdin = close;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.communicate.password_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_timeout_must_be_shorter_than_timeout() {
        let opts = RunOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_password_timeout(Duration::from_secs(5));
        let err = opts.communicate.validate().unwrap_err();
        assert!(matches!(err, JobError::Config(_)));

        let ok = RunOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_password_timeout(Duration::from_secs(1));
        assert!(ok.communicate.validate().is_ok());
    }

    #[test]
    fn extra_env_overrides_base() {
        let base = BTreeMap::from([
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "2".to_string()),
        ]);
        let opts = RunOptions::new().with_env(base).with_extra_env("B", "3");
        let env = opts.spawn.merged_env();
        assert_eq!(env.get("A").map(String::as_str), Some("1"));
        assert_eq!(env.get("B").map(String::as_str), Some("3"));
    }
}
