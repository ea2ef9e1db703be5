// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

pub use crate::artifact::fetch::{DownloadError, DownloadErrorKind};

#[derive(Error, Debug)]
pub enum StubRunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("failed to spawn process for command '{command}': {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process monitor was already started")]
    AlreadyStarted,

    /// The process closed stderr before the readiness marker showed up on
    /// stdout. `stderr` is everything it wrote there, verbatim.
    #[error("process ended its stderr stream before the expected output appeared: {stderr}")]
    OutputMismatch { stderr: String },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("process did not become ready within {0:?}")]
    ReadinessTimeout(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StubRunnerError>;
