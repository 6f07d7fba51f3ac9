// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{JobSpec, RawJobSpec, load_from_path};
use crate::errors::ExecuteError;
use crate::exec::{Job, RunOptions};
use crate::types::CommandLine;

pub use crate::errors::{FailureKind, JobError};
pub use crate::types::Interactive;

/// Spawn `command`, drive it to completion and return the closed job.
///
/// A non-zero exit status is not a failure; inspect [`Job::returncode`].
/// Launch failures, timeouts, rejected passwords and unkillable processes
/// come back as an [`ExecuteError`] carrying whatever output was collected.
pub async fn run(
    command: impl Into<CommandLine>,
    options: RunOptions,
) -> std::result::Result<Job, ExecuteError> {
    options
        .communicate
        .validate()
        .map_err(ExecuteError::without_job)?;

    let mut job = Job::spawn(command, &options.spawn).map_err(ExecuteError::without_job)?;
    match job.communicate(&options.communicate).await {
        Ok(()) => Ok(job),
        Err(err) => Err(ExecuteError::new(err, job.output())),
    }
}

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// - the child's own exit code when it exited,
/// - `128 + signal` when it was killed,
/// - `1` when the runner itself failed (the error is printed to stderr).
pub async fn run_cli(args: CliArgs) -> Result<i32> {
    let raw = match &args.job {
        Some(path) => load_from_path(path)
            .with_context(|| format!("failed to load job file {}", path.display()))?,
        None => RawJobSpec::default(),
    };
    let spec = JobSpec::try_from(args.overlay(raw)).context("invalid job")?;

    if args.dry_run {
        print_dry_run(&spec);
        return Ok(0);
    }

    let echoed = spec.options.communicate.interactive == Interactive::Echo;
    info!(command = ?spec.command, "running job");
    match run(spec.command, spec.options).await {
        Ok(job) => {
            if !job.stdout().is_empty() && !echoed {
                print!("{}", job.stdout());
            }
            if !job.stderr().is_empty() && !echoed {
                eprint!("{}", job.stderr());
            }
            Ok(exit_code(job.returncode(), job.signal()))
        }
        Err(err) => {
            eprintln!("jobrunner: {}: {err}", err.kind());
            Ok(1)
        }
    }
}

fn exit_code(returncode: Option<i32>, signal: Option<i32>) -> i32 {
    match (returncode, signal) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// Simple dry-run output: print the resolved command and options. Secrets
/// are shown by count only.
fn print_dry_run(spec: &JobSpec) {
    let spawn = &spec.options.spawn;
    let comm = &spec.options.communicate;

    println!("jobrunner dry-run");
    println!("  command: {:?}", spec.command);
    if let Some(cwd) = &spawn.cwd {
        println!("  cwd: {}", cwd.display());
    }
    println!("  pty: {}", spawn.pty);
    println!("  interactive: {:?}", comm.interactive);
    if let Some(timeout) = comm.timeout {
        println!("  timeout: {timeout:?}");
    }
    if !comm.passwords.is_empty() {
        println!("  passwords: {}", comm.passwords.len());
        println!("  password_timeout: {:?}", comm.effective_password_timeout());
    }
    if let Some(input) = &comm.input {
        println!("  input: {} bytes after {:?}", input.len(), comm.input_delay);
    }
    if spawn.env.is_some() {
        println!("  env: replaced");
    }
    for (key, value) in &spawn.extra_env {
        println!("  env.{key} = {value}");
    }

    debug!("dry-run complete (no execution)");
}

#[cfg(test)]
mod tests {
    use super::exit_code;

    #[test]
    fn exit_code_mirrors_the_child() {
        assert_eq!(exit_code(Some(0), None), 0);
        assert_eq!(exit_code(Some(3), None), 3);
        assert_eq!(exit_code(None, Some(9)), 137);
        assert_eq!(exit_code(None, None), 1);
    }
}
