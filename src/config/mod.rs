// src/config/mod.rs

//! Configuration loading and validation for stubrunner.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate URLs, durations and stub ids (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ArtifactSection, ConfigFile, RawArtifactSection, RawConfigFile, RawRunnerSection, RunnerSection};
pub use validate::{parse_duration, validate_stub_ids};
