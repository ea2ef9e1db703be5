// src/exec/monitor.rs

//! Launch one process and wait until it reports readiness.
//!
//! A run is a race between two events:
//!
//! - a stdout chunk contains the success marker → [`RunOutcome::Success`]
//! - stderr reaches end-of-stream → [`RunOutcome::Failure`] with everything
//!   written to stderr so far
//!
//! Whichever happens first decides the run; a [`CompletionGate`] makes sure
//! only one outcome is ever delivered. The watcher keeps draining both pipes
//! after that so a long-running process never blocks on a full pipe.
//!
//! Marker matching is chunk-local: a marker split across two reads is not
//! detected.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};

use crate::errors::{Result, StubRunnerError};
use crate::exec::launcher::{OutputPipe, ProcessHandle, ProcessLauncher};
use crate::exec::sink::OutputSink;

/// Upper bound for a single chunk read from a pipe.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// What to run and what to wait for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Full shell invocation, handed to the launcher verbatim.
    pub command: String,
    /// Literal substring searched for in each stdout chunk.
    pub success_marker: String,
    /// Echo stdout chunks to the info channel of the sink.
    pub emit_output: bool,
}

impl RunRequest {
    pub fn new(command: impl Into<String>, success_marker: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success_marker: success_marker.into(),
            emit_output: false,
        }
    }

    pub fn emit_output(mut self, emit: bool) -> Self {
        self.emit_output = emit;
        self
    }
}

/// The single result of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The marker was seen; the process is (presumably) still running.
    Success(ProcessHandle),
    /// Stderr closed first. Carries the concatenated stderr text.
    Failure(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        match self {
            RunOutcome::Success(handle) => Some(handle),
            RunOutcome::Failure(_) => None,
        }
    }

    pub fn error_text(&self) -> Option<&str> {
        match self {
            RunOutcome::Success(_) => None,
            RunOutcome::Failure(text) => Some(text),
        }
    }

    /// Turn a failure into [`StubRunnerError::OutputMismatch`].
    pub fn into_result(self) -> Result<ProcessHandle> {
        match self {
            RunOutcome::Success(handle) => Ok(handle),
            RunOutcome::Failure(stderr) => Err(StubRunnerError::OutputMismatch { stderr }),
        }
    }
}

/// One-shot cell: the first `resolve` wins, later ones are dropped.
#[derive(Debug)]
pub struct CompletionGate<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> CompletionGate<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.is_none()
    }

    /// Returns `true` if this call decided the outcome.
    pub fn resolve(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The caller may have stopped waiting; the run is decided either way.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    started: bool,
    handle: Option<ProcessHandle>,
}

/// Runs a single command and reports whether it became ready.
///
/// A monitor is single-use: [`start`] may succeed once. [`terminate`] may be
/// called from anywhere at any time, including while `start` is pending.
/// Terminating a pending run resolves it as [`RunOutcome::Failure`] with the
/// stderr text seen so far.
///
/// [`start`]: ProcessMonitor::start
/// [`terminate`]: ProcessMonitor::terminate
#[derive(Debug)]
pub struct ProcessMonitor {
    launcher: Arc<dyn ProcessLauncher>,
    sink: Arc<dyn OutputSink>,
    state: Mutex<MonitorState>,
    terminated: Arc<Notify>,
}

impl ProcessMonitor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            launcher,
            sink,
            state: Mutex::new(MonitorState::default()),
            terminated: Arc::new(Notify::new()),
        }
    }

    /// Launch `request.command` and wait until the run is decided.
    pub async fn start(&self, request: RunRequest) -> Result<RunOutcome> {
        if request.command.trim().is_empty() {
            return Err(StubRunnerError::InvalidRequest(
                "command must not be empty".to_string(),
            ));
        }

        let outcome_rx = {
            let mut state = self.lock_state();
            if state.started {
                return Err(StubRunnerError::AlreadyStarted);
            }

            info!(
                command = %request.command,
                marker = %request.success_marker,
                emit_output = request.emit_output,
                "launching process"
            );

            let launched = self.launcher.launch(&request.command)?;
            let handle = ProcessHandle::new(launched.control);
            state.started = true;
            state.handle = Some(handle.clone());

            let (gate, rx) = CompletionGate::new();
            let watcher = StreamWatcher {
                command: request.command,
                marker: request.success_marker.into_bytes(),
                emit_output: request.emit_output,
                sink: Arc::clone(&self.sink),
                gate,
                handle: Some(handle),
                terminated: Arc::clone(&self.terminated),
            };
            tokio::spawn(watcher.run(launched.stdout, launched.stderr));

            rx
        };

        outcome_rx.await.map_err(|_| {
            StubRunnerError::Other(anyhow::anyhow!(
                "process watcher stopped without deciding the run"
            ))
        })
    }

    /// Kill the process if it is still running.
    ///
    /// Returns `true` if a kill signal was sent. A no-op before launch. A
    /// pending run is resolved as failure even when the process had already
    /// exited and no signal was sent.
    pub fn terminate(&self) -> bool {
        let handle = self.lock_state().handle.clone();
        match handle {
            Some(handle) => {
                let sent = handle.terminate();
                self.terminated.notify_one();
                sent
            }
            None => {
                debug!("terminate called before any process was launched");
                false
            }
        }
    }

    /// Handle of the launched process, if any.
    pub fn handle(&self) -> Option<ProcessHandle> {
        self.lock_state().handle.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Like [`ProcessMonitor::start`], but gives up after `deadline`.
///
/// On expiry the process is terminated and
/// [`StubRunnerError::ReadinessTimeout`] is returned.
pub async fn wait_ready(
    monitor: &ProcessMonitor,
    request: RunRequest,
    deadline: Duration,
) -> Result<RunOutcome> {
    match tokio::time::timeout(deadline, monitor.start(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?deadline, "process did not become ready in time; terminating");
            monitor.terminate();
            Err(StubRunnerError::ReadinessTimeout(deadline))
        }
    }
}

/// Background reader for both pipes of one process.
struct StreamWatcher {
    command: String,
    marker: Vec<u8>,
    emit_output: bool,
    sink: Arc<dyn OutputSink>,
    gate: CompletionGate<RunOutcome>,
    handle: Option<ProcessHandle>,
    terminated: Arc<Notify>,
}

impl StreamWatcher {
    async fn run(mut self, mut stdout: OutputPipe, mut stderr: OutputPipe) {
        let mut out_buf = vec![0u8; CHUNK_SIZE];
        let mut err_buf = vec![0u8; CHUNK_SIZE];
        let mut error_text: Vec<u8> = Vec::new();

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut watching_termination = true;
        let terminated = Arc::clone(&self.terminated);

        while stdout_open || stderr_open {
            // Stdout first: a marker chunk beats a simultaneous stderr EOF.
            tokio::select! {
                biased;

                read = stdout.read(&mut out_buf), if stdout_open => match read {
                    Ok(0) => {
                        debug!(command = %self.command, "stdout closed");
                        stdout_open = false;
                    }
                    Ok(n) => self.on_stdout_chunk(&out_buf[..n]),
                    Err(e) => {
                        warn!(command = %self.command, error = %e, "reading stdout failed");
                        stdout_open = false;
                    }
                },

                read = stderr.read(&mut err_buf), if stderr_open => match read {
                    Ok(0) => {
                        debug!(command = %self.command, "stderr closed");
                        stderr_open = false;
                        self.fail(&error_text, "stderr closed before the success marker appeared");
                    }
                    Ok(n) => {
                        let chunk = &err_buf[..n];
                        self.sink.error(&String::from_utf8_lossy(chunk));
                        if !self.gate.is_resolved() {
                            error_text.extend_from_slice(chunk);
                        }
                    }
                    Err(e) => {
                        warn!(command = %self.command, error = %e, "reading stderr failed");
                        stderr_open = false;
                        self.fail(&error_text, "stderr failed before the success marker appeared");
                    }
                },

                _ = terminated.notified(), if watching_termination => {
                    watching_termination = false;
                    self.fail(&error_text, "process terminated before the success marker appeared");
                }
            }
        }

        debug!(command = %self.command, "process output streams ended");
    }

    fn on_stdout_chunk(&mut self, chunk: &[u8]) {
        if self.emit_output {
            self.sink.info(&String::from_utf8_lossy(chunk));
        }

        if self.gate.is_resolved() || !contains_marker(chunk, &self.marker) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            info!(
                command = %self.command,
                pid = ?handle.id(),
                "readiness marker observed"
            );
            self.gate.resolve(RunOutcome::Success(handle));
        }
    }

    fn fail(&mut self, error_text: &[u8], reason: &str) {
        if self.gate.is_resolved() {
            return;
        }
        self.handle = None;
        let text = String::from_utf8_lossy(error_text).into_owned();
        info!(command = %self.command, stderr_bytes = error_text.len(), "{}", reason);
        self.gate.resolve(RunOutcome::Failure(text));
    }
}

/// Byte substring search. An empty marker matches every chunk.
pub fn contains_marker(chunk: &[u8], marker: &[u8]) -> bool {
    marker.is_empty() || chunk.windows(marker.len()).any(|window| window == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_search_is_literal_and_chunk_local() {
        assert!(contains_marker(b"Started StubRunnerBoot in 4.2s", b"StubRunnerBoot"));
        assert!(contains_marker(b"expected", b"expected"));
        assert!(!contains_marker(b"expect", b"expected"));
        assert!(!contains_marker(b"a.c", b"abc"));
        assert!(contains_marker(b"anything", b""));
        assert!(!contains_marker(b"", b"x"));
    }

    #[test]
    fn gate_delivers_only_the_first_value() {
        let (mut gate, mut rx) = CompletionGate::new();
        assert!(!gate.is_resolved());
        assert!(gate.resolve(1));
        assert!(gate.is_resolved());
        assert!(!gate.resolve(2));
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn gate_tolerates_dropped_receiver() {
        let (mut gate, rx) = CompletionGate::new();
        drop(rx);
        assert!(gate.resolve("late"));
        assert!(gate.is_resolved());
    }

    #[test]
    fn failure_maps_to_output_mismatch() {
        let err = RunOutcome::Failure("boom\n".to_string())
            .into_result()
            .unwrap_err();
        match err {
            StubRunnerError::OutputMismatch { stderr } => assert_eq!(stderr, "boom\n"),
            other => panic!("expected OutputMismatch, got {other:?}"),
        }
    }
}
