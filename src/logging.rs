// src/logging.rs

//! `tracing` subscriber setup.
//!
//! The filter comes from `--log-level` when given. Otherwise `STUBRUNNER_LOG`
//! is read as an `EnvFilter` directive string, so per-target levels work
//! (`STUBRUNNER_LOG=stubrunner=debug,reqwest=warn`). Without either, `info`.
//!
//! Output goes to stderr. Echoed process output uses the `stubrunner::output`
//! target and can be silenced on its own with `stubrunner::output=off`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

/// Environment variable holding the default filter directives.
pub const LOG_ENV: &str = "STUBRUNNER_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Resolve the filter from the CLI flag and the raw env value.
///
/// An unparsable env value is an error rather than silently ignored.
fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.directive()));
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value '{directives}'")),
        None => Ok(EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
