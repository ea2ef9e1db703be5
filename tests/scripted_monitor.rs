// tests/scripted_monitor.rs
//
// Ordering-sensitive behaviour, driven through an in-memory process.
mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use stubrunner::errors::StubRunnerError;
use stubrunner::exec::{ProcessMonitor, RunOutcome, RunRequest, wait_ready};
use stubrunner_test_utils::{RecordingSink, ScriptedLauncher, ScriptedProcess};

type TestResult = Result<(), Box<dyn Error>>;

const MARKER: &str = "Started StubRunnerBoot in";

fn scripted_monitor(pid: u32) -> (ProcessMonitor, ScriptedProcess, RecordingSink) {
    let (launcher, process) = ScriptedLauncher::new(pid);
    let sink = RecordingSink::new();
    let monitor = ProcessMonitor::new(Arc::new(launcher), Arc::new(sink.clone()));
    (monitor, process, sink)
}

#[tokio::test]
async fn marker_in_first_chunk_wins_over_later_stderr() -> TestResult {
    init_tracing();
    let (monitor, process, sink) = scripted_monitor(42);

    process.stdout("Started StubRunnerBoot in 3.4 seconds\n").await;
    process.stderr("WARN something noisy\n").await;
    process.close_stderr().await;

    let outcome = with_timeout(monitor.start(RunRequest::new("java -jar x.jar", MARKER))).await?;

    let handle = outcome.handle().expect("expected Success");
    assert_eq!(handle.id(), Some(42));
    assert_eq!(process.commands(), vec!["java -jar x.jar".to_string()]);

    // Stderr is still echoed after the run was decided.
    with_timeout(sink.wait_for_error_chunks(1)).await;
    assert_eq!(sink.error_chunks().concat(), "WARN something noisy\n");
    Ok(())
}

#[tokio::test]
async fn stderr_only_fails_with_concatenated_text() -> TestResult {
    init_tracing();
    let (monitor, process, sink) = scripted_monitor(1);

    process.stderr("Error: Unable to access jarfile").await;
    process.stderr(" /tmp/stub-runner.jar\n").await;
    process.close_stderr().await;

    let outcome = with_timeout(monitor.start(RunRequest::new("java -jar x.jar", MARKER))).await?;

    assert_eq!(
        outcome.error_text(),
        Some("Error: Unable to access jarfile /tmp/stub-runner.jar\n")
    );
    assert_eq!(
        sink.error_chunks().concat(),
        "Error: Unable to access jarfile /tmp/stub-runner.jar\n"
    );
    Ok(())
}

#[tokio::test]
async fn stdout_without_marker_does_not_resolve() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(1);

    process.stdout("foo\n").await;

    let pending = tokio::time::timeout(
        Duration::from_millis(100),
        monitor.start(RunRequest::new("cmd", "expected output")),
    )
    .await;
    assert!(pending.is_err(), "run must stay pending while stderr is open");
    Ok(())
}

#[tokio::test]
async fn marker_split_across_chunks_is_not_detected() -> TestResult {
    init_tracing();
    let (monitor, process, sink) = scripted_monitor(1);

    let (outcome, ()) = with_timeout(async {
        tokio::join!(
            monitor.start(RunRequest::new("cmd", MARKER).emit_output(true)),
            async {
                process.stdout("Started Stub").await;
                sink.wait_for_info_chunks(1).await;
                process.stdout("RunnerBoot in 2.1 seconds\n").await;
                sink.wait_for_info_chunks(2).await;
                process.exit().await;
            }
        )
    })
    .await;

    assert_eq!(outcome?.error_text(), Some(""));
    assert_eq!(
        sink.info_chunks(),
        vec![
            "Started Stub".to_string(),
            "RunnerBoot in 2.1 seconds\n".to_string()
        ]
    );
    Ok(())
}

#[tokio::test]
async fn stdout_is_not_echoed_when_emit_output_is_off() -> TestResult {
    init_tracing();
    let (monitor, process, sink) = scripted_monitor(1);

    process.stdout("foo").await;
    process.close_stdout().await;
    process.close_stderr().await;

    let outcome = with_timeout(monitor.start(RunRequest::new("cmd", "expected"))).await?;

    assert!(!outcome.is_success());
    assert!(sink.info_chunks().is_empty());
    Ok(())
}

#[tokio::test]
async fn terminate_before_output_fails_the_pending_run() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(7);

    let (outcome, sent) = with_timeout(async {
        tokio::join!(monitor.start(RunRequest::new("cmd", MARKER)), async {
            tokio::task::yield_now().await;
            monitor.terminate()
        })
    })
    .await;

    assert!(sent);
    assert_eq!(process.kill_count(), 1);
    assert!(!process.is_running());
    match outcome? {
        RunOutcome::Failure(text) => assert_eq!(text, ""),
        RunOutcome::Success(_) => panic!("terminated run must not succeed"),
    }
    Ok(())
}

#[tokio::test]
async fn terminate_after_exit_still_fails_the_pending_run() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(8);
    process.stderr("warming up\n").await;
    process.mark_exited();

    let (outcome, sent) = with_timeout(async {
        tokio::join!(monitor.start(RunRequest::new("cmd", MARKER)), async {
            tokio::task::yield_now().await;
            monitor.terminate()
        })
    })
    .await;

    assert!(!sent);
    assert_eq!(process.kill_count(), 0);
    assert_eq!(outcome?.error_text(), Some("warming up\n"));
    Ok(())
}

#[tokio::test]
async fn terminate_after_success_does_not_change_outcome() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(9);

    process.stdout(MARKER).await;
    let outcome = with_timeout(monitor.start(RunRequest::new("cmd", MARKER))).await?;
    assert!(outcome.is_success());

    assert!(monitor.terminate());
    assert_eq!(process.kill_count(), 1);

    // Already exited: no-op.
    assert!(!monitor.terminate());
    assert!(!outcome.handle().unwrap().terminate());
    assert_eq!(process.kill_count(), 1);

    assert_eq!(outcome.handle().and_then(|h| h.id()), Some(9));
    Ok(())
}

#[tokio::test]
async fn terminate_before_start_is_a_no_op() {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(1);

    assert!(!monitor.terminate());
    assert_eq!(process.kill_count(), 0);
    assert!(process.commands().is_empty());
}

#[tokio::test]
async fn monitor_is_single_use() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(1);

    process.stdout("ready").await;
    let first = with_timeout(monitor.start(RunRequest::new("cmd", "ready"))).await?;
    assert!(first.is_success());

    match monitor.start(RunRequest::new("cmd", "ready")).await {
        Err(StubRunnerError::AlreadyStarted) => {}
        other => panic!("expected AlreadyStarted, got {other:?}"),
    }
    assert_eq!(process.commands().len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_command_is_rejected_before_launch() {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(1);

    match monitor.start(RunRequest::new("   ", "ready")).await {
        Err(StubRunnerError::InvalidRequest(msg)) => assert!(msg.contains("command")),
        other => panic!("expected InvalidRequest, got {other:?}"),
    }
    assert!(process.commands().is_empty());
}

#[tokio::test]
async fn launcher_failure_surfaces_as_spawn_failure() {
    init_tracing();
    let (launcher, _process) = ScriptedLauncher::new(1);
    let launcher = Arc::new(launcher);
    let sink = Arc::new(RecordingSink::new());

    // The scripted launcher hands out exactly one process.
    let first = ProcessMonitor::new(launcher.clone(), sink.clone());
    let _ = tokio::time::timeout(
        Duration::from_millis(10),
        first.start(RunRequest::new("cmd", "x")),
    )
    .await;

    let second = ProcessMonitor::new(launcher, sink);
    match second.start(RunRequest::new("other cmd", "x")).await {
        Err(StubRunnerError::SpawnFailure { command, .. }) => assert_eq!(command, "other cmd"),
        other => panic!("expected SpawnFailure, got {other:?}"),
    }

    // A failed launch leaves the monitor startable.
    assert!(second.handle().is_none());
}

#[tokio::test]
async fn wait_ready_terminates_on_deadline() {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(1);

    let result = wait_ready(
        &monitor,
        RunRequest::new("cmd", MARKER),
        Duration::from_millis(50),
    )
    .await;

    match result {
        Err(StubRunnerError::ReadinessTimeout(d)) => assert_eq!(d, Duration::from_millis(50)),
        other => panic!("expected ReadinessTimeout, got {other:?}"),
    }
    assert_eq!(process.kill_count(), 1);
}

#[tokio::test]
async fn wait_ready_passes_through_outcome() -> TestResult {
    init_tracing();
    let (monitor, process, _sink) = scripted_monitor(3);

    process.stdout("Started StubRunnerBoot in 1.0 seconds").await;
    let outcome = wait_ready(&monitor, RunRequest::new("cmd", MARKER), Duration::from_secs(5)).await?;

    assert!(outcome.is_success());
    assert_eq!(process.kill_count(), 0);
    Ok(())
}
