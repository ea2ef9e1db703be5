// src/exec/launcher.rs

//! Pluggable process launching.
//!
//! The monitor never touches `tokio::process` directly; it asks a
//! [`ProcessLauncher`] for a [`LaunchedProcess`] (two readable pipes plus a
//! control handle). [`ShellLauncher`] is the production implementation, and
//! tests can provide an in-memory one that scripts its output.

use std::fmt::Debug;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{Result, StubRunnerError};

/// A readable output pipe of a launched process.
pub type OutputPipe = Box<dyn AsyncRead + Send + Unpin>;

/// Control surface of a live process.
pub trait ProcessControl: Send + Sync + Debug {
    /// OS process id, if the process has one.
    fn id(&self) -> Option<u32>;

    /// Whether the process is still running.
    fn is_running(&self) -> bool;

    /// Send a kill signal. Must not block.
    fn kill(&self) -> std::io::Result<()>;
}

/// What a launcher hands back: both pipes plus a way to stop the process.
pub struct LaunchedProcess {
    pub stdout: OutputPipe,
    pub stderr: OutputPipe,
    pub control: Arc<dyn ProcessControl>,
}

/// Trait abstracting how a command string becomes a running process.
pub trait ProcessLauncher: Send + Sync + Debug {
    fn launch(&self, command: &str) -> Result<LaunchedProcess>;
}

/// Cloneable reference to a launched process.
///
/// Once the process has exited (or was terminated), [`terminate`] is a no-op.
///
/// [`terminate`]: ProcessHandle::terminate
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    control: Arc<dyn ProcessControl>,
}

impl ProcessHandle {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self { control }
    }

    pub fn id(&self) -> Option<u32> {
        self.control.id()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Kill the process if it is still alive.
    ///
    /// Returns `true` if a kill signal was sent. Never fails: a stale process
    /// or a failing signal only gets logged.
    ///
    /// On Unix the shell runs in its own process group and the whole group is
    /// signalled, so children of compound commands die with it. Once the shell
    /// itself has exited this is a no-op, even if background children remain.
    pub fn terminate(&self) -> bool {
        if !self.control.is_running() {
            debug!(pid = ?self.control.id(), "terminate on exited process; nothing to do");
            return false;
        }

        match self.control.kill() {
            Ok(()) => {
                info!(pid = ?self.control.id(), "terminated process");
                true
            }
            Err(e) => {
                warn!(pid = ?self.control.id(), error = %e, "failed to kill process");
                false
            }
        }
    }
}

/// Runs commands through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ShellLauncher;

impl ProcessLauncher for ShellLauncher {
    fn launch(&self, command: &str) -> Result<LaunchedProcess> {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // New process group, so `kill` reaches everything the shell started.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|source| StubRunnerError::SpawnFailure {
            command: command.to_string(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            StubRunnerError::Other(anyhow::anyhow!("child stdout was not piped"))
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            StubRunnerError::Other(anyhow::anyhow!("child stderr was not piped"))
        })?;

        let pid = child.id();
        debug!(pid = ?pid, %command, "spawned shell process");

        Ok(LaunchedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            control: Arc::new(ChildControl {
                pid,
                child: Mutex::new(child),
            }),
        })
    }
}

/// [`ProcessControl`] over a `tokio::process::Child`.
#[derive(Debug)]
struct ChildControl {
    pid: Option<u32>,
    child: Mutex<Child>,
}

impl ProcessControl for ChildControl {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_running(&self) -> bool {
        let mut child = match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        matches!(child.try_wait(), Ok(None))
    }

    fn kill(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                    Ok(()) => return Ok(()),
                    // Group already gone; fall back to the direct child.
                    Err(Errno::ESRCH) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let mut child = match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        child.start_kill()
    }
}
