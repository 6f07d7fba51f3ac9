// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::RunOptions;
use crate::types::{CommandLine, Interactive};

/// A job file as read from TOML.
///
/// ```toml
/// command = ["ssh", "backup@host", "df -h"]
/// cwd = "/srv"
/// pty = true
/// timeout = "2m"
/// password_timeout = "10s"
/// password_env = ["BACKUP_PASSWORD"]
///
/// [env]
/// LC_ALL = "C"
/// ```
///
/// Durations are strings such as `"250ms"`, `"3s"`, `"1m"`. Every field is
/// optional here; [`JobSpec::try_from`] decides what is actually required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJobSpec {
    /// Either a single string (split with shell-word rules) or a token list.
    #[serde(default)]
    pub command: Option<CommandLine>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    #[serde(default)]
    pub pty: bool,

    #[serde(default)]
    pub interactive: Interactive,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub password_timeout: Option<String>,

    #[serde(default)]
    pub input_delay: Option<String>,

    #[serde(default)]
    pub input: Option<String>,

    /// Literal secrets. Prefer `password_env` outside of tests.
    #[serde(default)]
    pub password: Vec<String>,

    /// Names of environment variables holding secrets, resolved at load time.
    #[serde(default)]
    pub password_env: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Start from the current environment (`true`) or from `env` alone.
    #[serde(default = "default_true")]
    pub inherit_env: bool,

    /// Pipe mode: end stdin once passwords and input are written.
    #[serde(default = "default_true")]
    pub close_stdin: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RawJobSpec {
    fn default() -> Self {
        Self {
            command: None,
            cwd: None,
            pty: false,
            interactive: Interactive::Off,
            timeout: None,
            password_timeout: None,
            input_delay: None,
            input: None,
            password: Vec::new(),
            password_env: Vec::new(),
            env: BTreeMap::new(),
            inherit_env: true,
            close_stdin: true,
        }
    }
}

/// A validated job: what to run and how.
///
/// Only constructed through `TryFrom<RawJobSpec>`, so the timeout rules and
/// secret lookups have already been checked.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub command: CommandLine,
    pub options: RunOptions,
}

impl JobSpec {
    pub(crate) fn new_unchecked(command: CommandLine, options: RunOptions) -> Self {
        Self { command, options }
    }
}
