// src/config/mod.rs

//! Job files.
//!
//! - [`model`] is the TOML-backed data model.
//! - [`loader`] reads a job file from disk.
//! - [`validate`] turns the raw model into a runnable [`JobSpec`].
//! - [`duration`] parses the human-readable durations both use.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path};
pub use model::{JobSpec, RawJobSpec};
