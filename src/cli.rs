// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::RawJobSpec;
use crate::types::{CommandLine, Interactive};

/// Command-line arguments for `jobrunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobrunner",
    version,
    about = "Run a command with timeouts, input and password prompts handled for you.",
    long_about = None
)]
pub struct CliArgs {
    /// Job file (TOML). Flags given on the command line override its values.
    #[arg(long, value_name = "PATH")]
    pub job: Option<PathBuf>,

    /// Working directory for the command.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Kill the command if it runs longer than this (e.g. "30s", "2m").
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// How long to wait for each password prompt.
    #[arg(long, value_name = "DURATION")]
    pub password_timeout: Option<String>,

    /// Environment variable holding a password; repeat for several prompts.
    #[arg(long = "password-env", value_name = "VAR")]
    pub password_env: Vec<String>,

    /// Text written to the command's stdin.
    #[arg(long, value_name = "TEXT")]
    pub input: Option<String>,

    /// Delay before `--input` is written.
    #[arg(long, value_name = "DURATION")]
    pub input_delay: Option<String>,

    /// Run the command on a pseudo-terminal.
    #[arg(long)]
    pub pty: bool,

    /// Forward the command's output while it runs.
    #[arg(long)]
    pub echo: bool,

    /// Extra environment variable for the command; repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the job, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// The command and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl CliArgs {
    /// Layer the flags on top of a job file (or an empty one).
    pub fn overlay(&self, mut raw: RawJobSpec) -> RawJobSpec {
        if !self.command.is_empty() {
            raw.command = Some(CommandLine::Tokens(self.command.clone()));
        }
        if let Some(cwd) = &self.cwd {
            raw.cwd = Some(cwd.clone());
        }
        if let Some(timeout) = &self.timeout {
            raw.timeout = Some(timeout.clone());
        }
        if let Some(password_timeout) = &self.password_timeout {
            raw.password_timeout = Some(password_timeout.clone());
        }
        if !self.password_env.is_empty() {
            raw.password_env = self.password_env.clone();
        }
        if let Some(input) = &self.input {
            raw.input = Some(input.clone());
        }
        if let Some(input_delay) = &self.input_delay {
            raw.input_delay = Some(input_delay.clone());
        }
        if self.pty {
            raw.pty = true;
        }
        if self.echo {
            raw.interactive = Interactive::Echo;
        }
        raw.env.extend(self.env.iter().cloned());
        raw
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_job_file() {
        let args = CliArgs::parse_from([
            "jobrunner",
            "--timeout",
            "5s",
            "--echo",
            "--env",
            "A=1",
            "--",
            "ls",
            "-la",
        ]);
        let raw = RawJobSpec {
            command: Some(CommandLine::Shell("echo from-file".to_string())),
            timeout: Some("1m".to_string()),
            ..RawJobSpec::default()
        };

        let merged = args.overlay(raw);
        assert_eq!(
            merged.command,
            Some(CommandLine::Tokens(vec!["ls".to_string(), "-la".to_string()]))
        );
        assert_eq!(merged.timeout.as_deref(), Some("5s"));
        assert_eq!(merged.interactive, Interactive::Echo);
        assert_eq!(merged.env.get("A").map(String::as_str), Some("1"));
    }

    #[test]
    fn key_val_needs_an_equals_sign() {
        assert!(parse_key_val("NOPE").is_err());
        assert!(parse_key_val("=x").is_err());
        assert_eq!(
            parse_key_val("K=a=b"),
            Ok(("K".to_string(), "a=b".to_string()))
        );
    }
}
