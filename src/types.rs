use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::JobError;

/// Whether output is forwarded to the caller's own stdout/stderr while the job
/// runs.
///
/// - `Off`: record only; output is available once the job is closed (default).
/// - `Echo`: record and echo each chunk as soon as it arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interactive {
    #[default]
    Off,
    Echo,
}

impl FromStr for Interactive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "false" | "" => Ok(Interactive::Off),
            "echo" => Ok(Interactive::Echo),
            other => Err(format!(
                "invalid interactive mode: {other} (expected \"off\" or \"echo\")"
            )),
        }
    }
}

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Stdout => f.write_str("stdout"),
            StreamName::Stderr => f.write_str("stderr"),
        }
    }
}

/// An item travelling through a job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    /// No further items will be produced on this channel.
    End,
}

/// How a terminated process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Exited(i32),
    Signaled(i32),
}

impl JobStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            JobStatus::Exited(code) => Some(*code),
            JobStatus::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            JobStatus::Exited(_) => None,
            JobStatus::Signaled(signal) => Some(*signal),
        }
    }
}

/// Result of [`crate::exec::Job::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    Data(Vec<u8>),
    /// Non-blocking read and nothing is ready yet.
    Pending,
    /// Both output streams have ended and everything has been read.
    Closed,
}

/// The command to run: either ready-made tokens or a string split with POSIX
/// shell-word rules. Strings are never handed to a shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Tokens(Vec<String>),
}

impl CommandLine {
    pub fn into_tokens(self) -> Result<Vec<String>, JobError> {
        let tokens = match self {
            CommandLine::Tokens(tokens) => tokens,
            CommandLine::Shell(line) => shlex::split(&line).ok_or_else(|| {
                JobError::Config(format!("unbalanced quoting in command line: {line}"))
            })?,
        };
        if tokens.first().is_none_or(|program| program.is_empty()) {
            return Err(JobError::Config("command must not be empty".to_string()));
        }
        Ok(tokens)
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        CommandLine::Shell(line.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(line: String) -> Self {
        CommandLine::Shell(line)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(tokens: Vec<String>) -> Self {
        CommandLine::Tokens(tokens)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(tokens: &[&str]) -> Self {
        CommandLine::Tokens(tokens.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(tokens: [&str; N]) -> Self {
        CommandLine::Tokens(tokens.iter().map(|t| t.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactive_defaults_to_off() {
        assert_eq!(Interactive::default(), Interactive::Off);
        assert_eq!("".parse::<Interactive>(), Ok(Interactive::Off));
        assert_eq!(" Echo ".parse::<Interactive>(), Ok(Interactive::Echo));
        assert!("loud".parse::<Interactive>().is_err());
    }
}
