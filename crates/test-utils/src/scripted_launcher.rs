use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWriteExt, DuplexStream};

use stubrunner::errors::{Result, StubRunnerError};
use stubrunner::exec::{LaunchedProcess, ProcessControl, ProcessLauncher};

const PIPE_CAPACITY: usize = 64 * 1024;

/// Writer halves of the fake process's stdout/stderr.
#[derive(Debug, Default)]
struct Pipes {
    stdout: tokio::sync::Mutex<Option<DuplexStream>>,
    stderr: tokio::sync::Mutex<Option<DuplexStream>>,
}

#[derive(Debug)]
struct ScriptedControl {
    pid: u32,
    running: AtomicBool,
    kills: AtomicUsize,
    pipes: Arc<Pipes>,
}

impl ProcessControl for ScriptedControl {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn kill(&self) -> std::io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        // A killed process closes its pipes.
        if let Ok(mut stdout) = self.pipes.stdout.try_lock() {
            stdout.take();
        }
        if let Ok(mut stderr) = self.pipes.stderr.try_lock() {
            stderr.take();
        }
        Ok(())
    }
}

/// A single-use launcher handing out an in-memory process.
///
/// Output written through the paired [`ScriptedProcess`] before the launch is
/// buffered and read once the monitor starts.
pub struct ScriptedLauncher {
    pending: Mutex<Option<LaunchedProcess>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl fmt::Debug for ScriptedLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedLauncher")
            .field("commands", &self.commands)
            .finish()
    }
}

impl ScriptedLauncher {
    pub fn new(pid: u32) -> (Self, ScriptedProcess) {
        let (stdout_writer, stdout_reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_writer, stderr_reader) = tokio::io::duplex(PIPE_CAPACITY);

        let pipes = Arc::new(Pipes {
            stdout: tokio::sync::Mutex::new(Some(stdout_writer)),
            stderr: tokio::sync::Mutex::new(Some(stderr_writer)),
        });
        let control = Arc::new(ScriptedControl {
            pid,
            running: AtomicBool::new(true),
            kills: AtomicUsize::new(0),
            pipes: Arc::clone(&pipes),
        });
        let commands = Arc::new(Mutex::new(Vec::new()));

        let launched = LaunchedProcess {
            stdout: Box::new(stdout_reader),
            stderr: Box::new(stderr_reader),
            control: Arc::clone(&control) as Arc<dyn ProcessControl>,
        };

        let launcher = Self {
            pending: Mutex::new(Some(launched)),
            commands: Arc::clone(&commands),
        };
        let process = ScriptedProcess {
            pipes,
            control,
            commands,
        };
        (launcher, process)
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, command: &str) -> Result<LaunchedProcess> {
        self.commands.lock().unwrap().push(command.to_string());
        self.pending
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| StubRunnerError::SpawnFailure {
                command: command.to_string(),
                source: std::io::Error::other("scripted process was already launched"),
            })
    }
}

/// Test-side handle used to drive the fake process.
#[derive(Debug)]
pub struct ScriptedProcess {
    pipes: Arc<Pipes>,
    control: Arc<ScriptedControl>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProcess {
    pub fn pid(&self) -> u32 {
        self.control.pid
    }

    /// Commands the launcher was asked to run.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn kill_count(&self) -> usize {
        self.control.kills.load(Ordering::SeqCst)
    }

    pub async fn stdout(&self, text: &str) {
        write_to(&self.pipes.stdout, text).await;
    }

    pub async fn stderr(&self, text: &str) {
        write_to(&self.pipes.stderr, text).await;
    }

    pub async fn close_stdout(&self) {
        self.pipes.stdout.lock().await.take();
    }

    pub async fn close_stderr(&self) {
        self.pipes.stderr.lock().await.take();
    }

    /// Mark the process as exited while leaving its pipes open, like a shell
    /// whose background child still holds stdout and stderr.
    pub fn mark_exited(&self) {
        self.control.running.store(false, Ordering::SeqCst);
    }

    /// Close both pipes and mark the process as exited.
    pub async fn exit(&self) {
        self.close_stdout().await;
        self.close_stderr().await;
        self.control.running.store(false, Ordering::SeqCst);
    }
}

async fn write_to(pipe: &tokio::sync::Mutex<Option<DuplexStream>>, text: &str) {
    let mut guard = pipe.lock().await;
    if let Some(writer) = guard.as_mut() {
        // The reader may be gone already; that is fine for a fake process.
        let _ = writer.write_all(text.as_bytes()).await;
        let _ = writer.flush().await;
    }
}
