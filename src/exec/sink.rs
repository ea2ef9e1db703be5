// src/exec/sink.rs

//! Where observed process output goes.
//!
//! The monitor writes every stderr chunk to the error channel and, when asked
//! to, every stdout chunk to the info channel. Production code uses
//! [`TracingSink`]; tests plug in a recording sink.

use std::fmt::Debug;

use tracing::{error, info};

/// Two independent, human-readable output channels.
pub trait OutputSink: Send + Sync + Debug {
    fn info(&self, chunk: &str);
    fn error(&self, chunk: &str);
}

/// Forwards chunks as `tracing` events under the `stubrunner::output` target.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn info(&self, chunk: &str) {
        info!(target: "stubrunner::output", "{}", chunk.trim_end_matches('\n'));
    }

    fn error(&self, chunk: &str) {
        error!(target: "stubrunner::output", "{}", chunk.trim_end_matches('\n'));
    }
}
