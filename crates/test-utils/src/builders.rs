#![allow(dead_code)]

use std::collections::BTreeMap;

use jobrunner::config::{JobSpec, RawJobSpec};
use jobrunner::types::{CommandLine, Interactive};

/// Builder for `RawJobSpec` to simplify test setup.
pub struct RawJobSpecBuilder {
    spec: RawJobSpec,
}

impl RawJobSpecBuilder {
    pub fn new(command: impl Into<CommandLine>) -> Self {
        Self {
            spec: RawJobSpec {
                command: Some(command.into()),
                ..RawJobSpec::default()
            },
        }
    }

    pub fn cwd(mut self, cwd: impl Into<std::path::PathBuf>) -> Self {
        self.spec.cwd = Some(cwd.into());
        self
    }

    pub fn pty(mut self) -> Self {
        self.spec.pty = true;
        self
    }

    pub fn echo(mut self) -> Self {
        self.spec.interactive = Interactive::Echo;
        self
    }

    pub fn timeout(mut self, value: &str) -> Self {
        self.spec.timeout = Some(value.to_string());
        self
    }

    pub fn password_timeout(mut self, value: &str) -> Self {
        self.spec.password_timeout = Some(value.to_string());
        self
    }

    pub fn input(mut self, text: &str, delay: &str) -> Self {
        self.spec.input = Some(text.to_string());
        self.spec.input_delay = Some(delay.to_string());
        self
    }

    pub fn password(mut self, secret: &str) -> Self {
        self.spec.password.push(secret.to_string());
        self
    }

    pub fn password_env(mut self, var: &str) -> Self {
        self.spec.password_env.push(var.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Start from an empty environment instead of the test process's.
    pub fn isolated_env(mut self) -> Self {
        self.spec.inherit_env = false;
        self
    }

    pub fn raw(self) -> RawJobSpec {
        self.spec
    }

    pub fn build(self) -> JobSpec {
        JobSpec::try_from(self.spec).expect("Failed to build valid job spec from builder")
    }
}

/// Minimal environment for jobs started with an isolated environment.
pub fn path_only_env() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "PATH".to_string(),
        std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string()),
    )])
}
