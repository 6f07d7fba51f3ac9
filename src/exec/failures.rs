// src/exec/failures.rs

//! Failure log shared by a job's worker tasks.
//!
//! Workers never return errors to anyone; they append a [`Failure`] here and
//! exit. The controlling call converts the log into a single [`JobError`] with
//! [`FailureLog::to_result`].

use std::fmt;
use std::panic::Location;

use crate::errors::{FailureKind, JobError};

const RULE_WIDTH: usize = 50;

/// One recorded failure: the error, which worker recorded it, and where.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: JobError,
    pub origin: &'static str,
    pub location: &'static Location<'static>,
}

impl Failure {
    #[track_caller]
    pub fn new(origin: &'static str, error: JobError) -> Self {
        Self {
            error,
            origin,
            location: Location::caller(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} at {}:{})",
            self.kind(),
            self.error,
            self.origin,
            self.location.file(),
            self.location.line()
        )
    }
}

/// Append-only, ordered list of failures.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    entries: Vec<Failure>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` and hand a copy back so the caller can also return it.
    #[track_caller]
    pub fn record(&mut self, origin: &'static str, error: JobError) -> JobError {
        self.entries.push(Failure::new(origin, error.clone()));
        error
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Failure> {
        self.entries.iter()
    }

    /// - empty log: `Ok(())`
    /// - one failure: that failure's error, unchanged
    /// - several: a [`JobError::Composite`] listing each failure's origin,
    ///   kind and message in recording order. Its kind is that of the last
    ///   unable-to-kill failure if there is one, else of the last failure.
    pub fn to_result(&self) -> Result<(), JobError> {
        match self.entries.as_slice() {
            [] => Ok(()),
            [only] => Err(only.error.clone()),
            many => Err(composite(many)),
        }
    }
}

fn composite(entries: &[Failure]) -> JobError {
    let rule = "-".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone()];
    for failure in entries {
        lines.push(format!(
            "{} at {}:{}",
            failure.origin,
            failure.location.file(),
            failure.location.line()
        ));
        lines.push(format!("{}: {}", failure.kind(), failure.error));
        lines.push(rule.clone());
    }

    let kind = entries
        .iter()
        .rev()
        .find(|f| f.kind() == FailureKind::UnableToKill)
        .or(entries.last())
        .map(Failure::kind)
        .unwrap_or(FailureKind::Execution);

    let details = lines
        .iter()
        .flat_map(|block| block.lines())
        .filter(|line| !line.is_empty())
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    JobError::Composite {
        kind,
        details: format!("\n{details}"),
    }
}
