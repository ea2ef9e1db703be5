// src/artifact/runner.rs

//! Ensure the stub runner jar is cached locally, then launch it and wait for
//! its readiness banner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::artifact::fetch::{ArtifactFetcher, DownloadError, HttpFetcher};
use crate::artifact::location::ArtifactLocation;
use crate::config::validate::validate_stub_ids;
use crate::errors::Result;
use crate::exec::{
    OutputSink, ProcessLauncher, ProcessMonitor, RunOutcome, RunRequest, ShellLauncher,
    TracingSink,
};
use crate::fs::{FileSystem, RealFileSystem};

/// Banner the stub runner prints once all stubs are served.
pub const READY_MARKER: &str = "Started StubRunnerBoot in";

pub const IDS_PROPERTY: &str = "stubRunner.ids";
pub const MODE_PROPERTY: &str = "stubRunner.stubsMode";
pub const STUBS_MODE: &str = "LOCAL";

/// Explicit defaults for an [`ArtifactRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Location used by [`ArtifactRunner::run_stubs`].
    pub location: ArtifactLocation,
    /// Java runtime binary.
    pub java: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            location: ArtifactLocation::default(),
            java: "java".to_string(),
        }
    }
}

/// `<java> -DstubRunner.ids=<ids> -DstubRunner.stubsMode=LOCAL -jar <jar>`
///
/// Plain interpolation, no quoting.
pub fn build_command(java: &str, stub_ids: &str, jar: &Path) -> String {
    format!(
        "{java} -D{IDS_PROPERTY}={stub_ids} -D{MODE_PROPERTY}={STUBS_MODE} -jar {}",
        jar.display()
    )
}

/// Downloads the jar on first use and launches it through a [`ProcessMonitor`].
///
/// Concurrent callers on the same runner that need the same missing file
/// share a single download. Separate runner instances do not coordinate.
#[derive(Debug)]
pub struct ArtifactRunner {
    settings: RunnerSettings,
    fs: Arc<dyn FileSystem>,
    fetcher: Arc<dyn ArtifactFetcher>,
    launcher: Arc<dyn ProcessLauncher>,
    sink: Arc<dyn OutputSink>,
    downloads: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactRunner {
    pub fn new(
        settings: RunnerSettings,
        fs: Arc<dyn FileSystem>,
        fetcher: Arc<dyn ArtifactFetcher>,
        launcher: Arc<dyn ProcessLauncher>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            settings,
            fs,
            fetcher,
            launcher,
            sink,
            downloads: Mutex::new(HashMap::new()),
        }
    }

    /// Real filesystem, HTTP, shell and `tracing` output.
    pub fn with_settings(settings: RunnerSettings) -> Result<Self> {
        Ok(Self::new(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(HttpFetcher::new()?),
            Arc::new(ShellLauncher),
            Arc::new(TracingSink),
        ))
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Command line that would launch the stub runner for `stub_ids`.
    pub fn command_for(&self, stub_ids: &str, location: &ArtifactLocation) -> String {
        build_command(&self.settings.java, stub_ids, &location.local_path)
    }

    /// [`ensure_and_run`](Self::ensure_and_run) with the configured location.
    pub async fn run_stubs(&self, stub_ids: &str, emit_output: bool) -> Result<RunOutcome> {
        let location = self.settings.location.clone();
        self.ensure_and_run(stub_ids, &location, emit_output).await
    }

    /// Make sure the jar exists, launch it and wait for [`READY_MARKER`].
    pub async fn ensure_and_run(
        &self,
        stub_ids: &str,
        location: &ArtifactLocation,
        emit_output: bool,
    ) -> Result<RunOutcome> {
        let (monitor, request) = self.prepare(stub_ids, location, emit_output).await?;
        monitor.start(request).await
    }

    /// Everything up to the launch: validate ids, ensure the artifact, and
    /// return a fresh monitor with the request to start.
    ///
    /// Callers that need a deadline or early termination start the monitor
    /// themselves.
    pub async fn prepare(
        &self,
        stub_ids: &str,
        location: &ArtifactLocation,
        emit_output: bool,
    ) -> Result<(ProcessMonitor, RunRequest)> {
        validate_stub_ids(stub_ids)?;
        self.ensure_artifact(location).await?;

        let command = self.command_for(stub_ids, location);
        let request = RunRequest::new(command, READY_MARKER).emit_output(emit_output);
        let monitor = ProcessMonitor::new(Arc::clone(&self.launcher), Arc::clone(&self.sink));
        Ok((monitor, request))
    }

    /// Download the artifact unless a file already exists at its local path.
    ///
    /// Returns `true` if this call performed the download.
    pub async fn ensure_artifact(&self, location: &ArtifactLocation) -> Result<bool> {
        if self.fs.exists(&location.local_path) {
            debug!(path = ?location.local_path, "artifact already cached");
            return Ok(false);
        }

        let lock = self.download_lock(&location.local_path);
        let result = {
            let _guard = lock.lock().await;
            if self.fs.exists(&location.local_path) {
                debug!(
                    path = ?location.local_path,
                    "artifact was downloaded by a concurrent caller"
                );
                Ok(false)
            } else {
                self.download(location).await.map(|()| true)
            }
        };
        self.release_download_lock(&location.local_path, lock);
        result
    }

    /// Number of paths with a download lock currently held or awaited.
    pub fn pending_downloads(&self) -> usize {
        self.lock_downloads().len()
    }

    fn download_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.lock_downloads().entry(path.to_path_buf()).or_default())
    }

    /// Drop the map entry once no other caller holds a reference to it.
    fn release_download_lock(&self, path: &Path, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut downloads = self.lock_downloads();
        drop(lock);
        if let Some(entry) = downloads.get(path) {
            if Arc::strong_count(entry) == 1 {
                downloads.remove(path);
            }
        }
    }

    fn lock_downloads(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>> {
        match self.downloads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn download(&self, location: &ArtifactLocation) -> Result<()> {
        let url = location.remote_url.as_str();
        info!(
            path = ?location.local_path,
            %url,
            "artifact not found locally; downloading (this can take a while on the first run)"
        );

        if let Some(parent) = location.local_path.parent() {
            if !parent.as_os_str().is_empty() {
                self.fs
                    .create_dir_all(parent)
                    .await
                    .map_err(|e| DownloadError::io(url, format!("{e:#}")))?;
            }
        }

        let partial = location.partial_path();
        let written = match self.download_to(url, &partial, &location.local_path).await {
            Ok(written) => written,
            Err(err) => {
                if self.fs.exists(&partial) {
                    if let Err(cleanup) = self.fs.remove_file(&partial).await {
                        warn!(path = ?partial, error = %cleanup, "failed to remove partial download");
                    }
                }
                return Err(err.into());
            }
        };

        info!(path = ?location.local_path, bytes = written, "artifact downloaded");
        Ok(())
    }

    /// Stream `url` into `partial`, then move it to `dest`.
    async fn download_to(
        &self,
        url: &str,
        partial: &Path,
        dest: &Path,
    ) -> std::result::Result<u64, DownloadError> {
        let mut sink = self
            .fs
            .open_write(partial)
            .await
            .map_err(|e| DownloadError::io(url, format!("{e:#}")))?;

        let written = self.fetcher.fetch(url, &mut sink).await?;
        sink.shutdown()
            .await
            .map_err(|e| DownloadError::io(url, e.to_string()))?;
        drop(sink);

        self.fs
            .rename(partial, dest)
            .await
            .map_err(|e| DownloadError::io(url, format!("{e:#}")))?;
        Ok(written)
    }
}
