// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::model::{JobSpec, RawJobSpec};
use crate::errors::Result;

/// Load a job file and return the raw `RawJobSpec`.
///
/// This only performs TOML deserialization; secrets are not resolved and
/// timeouts are not checked. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawJobSpec> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading job file");
    let contents = fs::read_to_string(path)?;

    let spec: RawJobSpec = toml::from_str(&contents)?;

    Ok(spec)
}

/// Load a job file and validate it into a runnable [`JobSpec`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<JobSpec> {
    let raw = load_from_path(&path)?;
    let spec = JobSpec::try_from(raw)?;
    Ok(spec)
}
