// src/lib.rs

pub mod artifact;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactLocation, ArtifactRunner};
use crate::cli::{CliArgs, Command, ExecArgs, StubsArgs};
use crate::config::model::ConfigFile;
use crate::config::validate::{parse_duration, validate_download_url, validate_stub_ids};
use crate::config::load_or_default;
use crate::exec::{
    ProcessHandle, ProcessMonitor, RunOutcome, RunRequest, ShellLauncher, TracingSink, wait_ready,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - artifact resolution (for `stubs`)
/// - the process monitor
/// - Ctrl-C handling, both while waiting for readiness and afterwards
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Exec(exec) => run_exec(&cfg, exec).await,
        Command::Stubs(stubs) => run_stubs(&cfg, stubs).await,
    }
}

async fn run_exec(cfg: &ConfigFile, args: ExecArgs) -> Result<()> {
    let deadline = effective_timeout(cfg, args.timeout.as_deref())?;
    let request =
        RunRequest::new(args.cmd, args.marker).emit_output(args.show_output || cfg.runner.show_output);

    let monitor = ProcessMonitor::new(Arc::new(ShellLauncher), Arc::new(TracingSink));
    let outcome = await_ready(&monitor, request, deadline).await?;
    hold_until_shutdown(&monitor, outcome).await
}

async fn run_stubs(cfg: &ConfigFile, args: StubsArgs) -> Result<()> {
    let deadline = effective_timeout(cfg, args.timeout.as_deref())?;

    let mut settings = cfg.runner_settings();
    if let Some(jar) = args.jar {
        settings.location.local_path = jar;
    }
    if let Some(url) = args.download_url {
        validate_download_url(&url)?;
        settings.location.remote_url = url;
    }
    if let Some(java) = args.java {
        settings.java = java;
    }

    let runner = ArtifactRunner::with_settings(settings)?;
    let location = runner.settings().location.clone();

    if args.dry_run {
        validate_stub_ids(&args.ids)?;
        print_dry_run(&runner, &args.ids, &location);
        return Ok(());
    }

    let emit_output = args.show_output || cfg.runner.show_output;
    let (monitor, request) = runner
        .prepare(&args.ids, &location, emit_output)
        .await
        .context("preparing stub runner")?;

    let outcome = await_ready(&monitor, request, deadline).await?;
    hold_until_shutdown(&monitor, outcome).await
}

fn effective_timeout(cfg: &ConfigFile, flag: Option<&str>) -> Result<Option<Duration>> {
    match flag {
        Some(s) => parse_duration(s)
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid --timeout: {e}")),
        None => Ok(cfg.runner.ready_timeout),
    }
}

/// Start the monitor, honouring an optional deadline and Ctrl-C.
async fn await_ready(
    monitor: &ProcessMonitor,
    request: RunRequest,
    deadline: Option<Duration>,
) -> Result<RunOutcome> {
    let start = async {
        match deadline {
            Some(deadline) => wait_ready(monitor, request, deadline).await,
            None => monitor.start(request).await,
        }
    };

    tokio::select! {
        outcome = start => Ok(outcome?),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            monitor.terminate();
            anyhow::bail!("interrupted before the process became ready")
        }
    }
}

/// Keep a ready process alive until Ctrl-C or until it exits by itself.
async fn hold_until_shutdown(monitor: &ProcessMonitor, outcome: RunOutcome) -> Result<()> {
    let handle = outcome.into_result()?;
    info!(pid = ?handle.id(), "process is ready; press Ctrl+C to stop it");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("shutting down");
            monitor.terminate();
        }
        _ = wait_for_exit(&handle) => {
            info!(pid = ?handle.id(), "process exited on its own");
        }
    }

    Ok(())
}

async fn wait_for_exit(handle: &ProcessHandle) {
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    while handle.is_running() {
        ticker.tick().await;
    }
}

/// Simple dry-run output: resolved jar location, cache state and command.
fn print_dry_run(runner: &ArtifactRunner, ids: &str, location: &ArtifactLocation) {
    println!("stubrunner dry-run");
    println!("  jar: {}", location.local_path.display());
    println!("  cached: {}", location.local_path.exists());
    println!("  download_url: {}", location.remote_url);
    println!("  command: {}", runner.command_for(ids, location));

    debug!("dry-run complete (no download, no execution)");
}
