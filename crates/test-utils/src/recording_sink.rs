use std::sync::{Arc, Mutex};
use std::time::Duration;

use stubrunner::exec::OutputSink;

/// Sink that remembers every chunk it was given, per channel.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    info: Arc<Mutex<Vec<String>>>,
    error: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_chunks(&self) -> Vec<String> {
        self.info.lock().unwrap().clone()
    }

    pub fn error_chunks(&self) -> Vec<String> {
        self.error.lock().unwrap().clone()
    }

    /// Poll until at least `n` info chunks have been recorded.
    pub async fn wait_for_info_chunks(&self, n: usize) {
        while self.info.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until at least `n` error chunks have been recorded.
    pub async fn wait_for_error_chunks(&self, n: usize) {
        while self.error.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl OutputSink for RecordingSink {
    fn info(&self, chunk: &str) {
        self.info.lock().unwrap().push(chunk.to_string());
    }

    fn error(&self, chunk: &str) {
        self.error.lock().unwrap().push(chunk.to_string());
    }
}
