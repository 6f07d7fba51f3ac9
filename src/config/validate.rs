// src/config/validate.rs

use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::config::model::{JobSpec, RawJobSpec};
use crate::errors::{JobrunnerError, Result};
use crate::exec::RunOptions;
use crate::exec::options::check_timeouts;

impl TryFrom<RawJobSpec> for JobSpec {
    type Error = JobrunnerError;

    fn try_from(raw: RawJobSpec) -> std::result::Result<Self, Self::Error> {
        let command = raw.command.ok_or_else(|| {
            JobrunnerError::ConfigError("a job needs a `command`".to_string())
        })?;
        command
            .clone()
            .into_tokens()
            .map_err(|err| JobrunnerError::ConfigError(err.to_string()))?;

        let timeout = parse_field("timeout", raw.timeout.as_deref())?;
        let password_timeout = parse_field("password_timeout", raw.password_timeout.as_deref())?;
        let input_delay = parse_field("input_delay", raw.input_delay.as_deref())?;
        check_timeouts(timeout, password_timeout)
            .map_err(|err| JobrunnerError::ConfigError(err.to_string()))?;

        let mut options = RunOptions::new()
            .with_pty(raw.pty)
            .with_interactive(raw.interactive)
            .with_close_stdin(raw.close_stdin)
            .with_passwords(raw.password)
            .with_passwords(resolve_secrets(&raw.password_env)?);

        if let Some(cwd) = raw.cwd {
            options = options.with_cwd(cwd);
        }
        if let Some(timeout) = timeout {
            options = options.with_timeout(timeout);
        }
        if let Some(password_timeout) = password_timeout {
            options = options.with_password_timeout(password_timeout);
        }
        if let Some(input_delay) = input_delay {
            options = options.with_input_delay(input_delay);
        }
        if let Some(input) = raw.input {
            options = options.with_input(input);
        }

        if raw.inherit_env {
            options.spawn.extra_env = raw.env;
        } else {
            options = options.with_env(raw.env);
        }

        Ok(JobSpec::new_unchecked(command, options))
    }
}

fn parse_field(field: &str, value: Option<&str>) -> Result<Option<Duration>> {
    value
        .map(|text| {
            parse_duration(text)
                .map_err(|err| JobrunnerError::ConfigError(format!("`{field}`: {err}")))
        })
        .transpose()
}

/// Look up each named variable in the runner's own environment.
fn resolve_secrets(names: &[String]) -> Result<Vec<String>> {
    names
        .iter()
        .map(|name| {
            std::env::var(name).map_err(|_| {
                JobrunnerError::ConfigError(format!(
                    "password_env: environment variable '{name}' is not set"
                ))
            })
        })
        .collect()
}
