// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`launcher`] provides the `ProcessLauncher` trait, the production
//!   `ShellLauncher` (built on `tokio::process::Command`) and `ProcessHandle`.
//! - [`monitor`] owns the run-and-wait primitive: launch a command, watch its
//!   stdout for a marker and its stderr for end-of-stream.
//! - [`sink`] is where observed output is echoed (`tracing` in production).

pub mod launcher;
pub mod monitor;
pub mod sink;

pub use launcher::{LaunchedProcess, ProcessControl, ProcessHandle, ProcessLauncher, ShellLauncher};
pub use monitor::{ProcessMonitor, RunOutcome, RunRequest, wait_ready};
pub use sink::{OutputSink, TracingSink};
