// tests/monitor_properties.rs
use std::sync::Arc;

use proptest::prelude::*;
use stubrunner::exec::{ProcessMonitor, RunOutcome, RunRequest};
use stubrunner_test_utils::{RecordingSink, ScriptedLauncher, with_timeout};

// Lowercase text never contains the upper-case marker.
const MARKER: &str = "READY";

fn chunk_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z \n]{0,24}", 0..8)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Write `stdout`/`stderr` chunks, close both pipes, and run to completion.
fn run_scripted(
    stdout: &[String],
    stderr: &[String],
    emit_output: bool,
) -> (RunOutcome, RecordingSink) {
    runtime().block_on(async {
        let (launcher, process) = ScriptedLauncher::new(1);
        let sink = RecordingSink::new();
        let monitor = ProcessMonitor::new(Arc::new(launcher), Arc::new(sink.clone()));

        for chunk in stdout {
            process.stdout(chunk).await;
        }
        for chunk in stderr {
            process.stderr(chunk).await;
        }
        process.exit().await;

        let request = RunRequest::new("cmd", MARKER).emit_output(emit_output);
        let outcome = with_timeout(monitor.start(request)).await.unwrap();
        (outcome, sink)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn failure_text_is_exact_stderr_concatenation(stderr in chunk_strategy()) {
        let (outcome, sink) = run_scripted(&[], &stderr, false);
        let expected = stderr.concat();

        prop_assert_eq!(outcome.error_text(), Some(expected.as_str()));
        prop_assert_eq!(sink.error_chunks().concat(), expected);
    }

    #[test]
    fn stdout_reaches_info_sink_only_with_emit_output(
        stdout in chunk_strategy(),
        emit_output in any::<bool>(),
    ) {
        let (outcome, sink) = run_scripted(&stdout, &[], emit_output);

        prop_assert!(!outcome.is_success());
        if emit_output {
            // Pipes may coalesce writes, but every byte arrives once, in order.
            prop_assert_eq!(sink.info_chunks().concat(), stdout.concat());
        } else {
            prop_assert!(sink.info_chunks().is_empty());
        }
    }

    #[test]
    fn marker_anywhere_in_stdout_wins(
        before in "[a-z ]{0,16}",
        after in "[a-z \n]{0,16}",
        stderr in chunk_strategy(),
    ) {
        let line = format!("{before}{MARKER}{after}");
        let (outcome, _sink) = run_scripted(&[line], &stderr, false);

        prop_assert!(outcome.is_success());
    }
}
