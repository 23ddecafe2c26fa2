//! Loop-level harness tests for full lifecycle scenarios.
//!
//! These drive `run_loop` with scripted invokers to verify end-to-end
//! behavior: completion via markers, struggle accumulation up to the
//! iteration budget, stop-file aborts, and start failures.

use std::fs;

use ralph::core::struggle::StruggleReason;
use ralph::core::task::TaskStatus;
use ralph::io::config::{RalphConfig, StruggleConfig};
use ralph::io::history::HistoryRecorder;
use ralph::io::paths::RalphPaths;
use ralph::io::task_store::TaskStore;
use ralph::looping::{IterationReport, LoopRequest, LoopStop, run_loop};
use ralph::test_support::{FailingInvoker, ScriptedInvoker, ScriptedReply};

fn setup(temp: &tempfile::TempDir) -> (RalphPaths, TaskStore) {
    let paths = RalphPaths::new(temp.path());
    let store = TaskStore::new(&paths.tasks_path, &paths.lock_path);
    (paths, store)
}

fn request(max_iterations: u32) -> LoopRequest {
    LoopRequest {
        base_prompt: "work the checklist".to_string(),
        max_iterations,
    }
}

/// Two tasks, finished one per iteration via `COMPLETED:` markers. The loop
/// stops as `Completed` on the third pass without invoking the agent again.
#[test]
fn markers_complete_the_checklist() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("alpha").expect("add");
    store.add("beta").expect("add");

    let invoker = ScriptedInvoker::new(vec![
        ScriptedReply::ok("did some work\nCOMPLETED: alpha"),
        ScriptedReply::ok("wrapped up\nCOMPLETED: beta"),
    ]);
    let mut reports: Vec<IterationReport> = Vec::new();

    let outcome = run_loop(
        &paths,
        &invoker,
        &RalphConfig::default(),
        &request(5),
        |report| reports.push(report.clone()),
    )
    .expect("loop");

    assert_eq!(outcome.iterations_run, 2);
    assert_eq!(outcome.stop, LoopStop::Completed { iterations: 2 });
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].tasks_completed, 1);
    assert_eq!(reports[0].tasks_remaining, 1);
    assert_eq!(reports[1].tasks_remaining, 0);

    let tasks = store.load().expect("load");
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Done));

    let history = HistoryRecorder::new(&paths.history_path).load().expect("history");
    assert_eq!(history.iterations, 2);
    assert!(history.struggle_indicators.is_empty());
}

/// The prompt for each iteration carries the base prompt, the checklist,
/// and (from the second iteration on) the accumulated context log.
#[test]
fn prompts_grow_with_context() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("slow task").expect("add");

    let invoker = ScriptedInvoker::new(vec![
        ScriptedReply::ok("first attempt"),
        ScriptedReply::ok("second attempt"),
    ]);

    run_loop(
        &paths,
        &invoker,
        &RalphConfig::default(),
        &request(2),
        |_| {},
    )
    .expect("loop");

    let requests = invoker.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prompt.contains("work the checklist"));
    assert!(requests[0].prompt.contains("- [ ] slow task"));
    assert!(!requests[0].prompt.contains("Iteration 1"));
    assert!(requests[1].prompt.contains("Iteration 1"));
}

/// Distinct outputs and zero completions: once the configured streak is
/// reached, every further iteration records a `no_progress` event.
#[test]
fn no_progress_struggles_accumulate_until_budget() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("stubborn task").expect("add");

    let cfg = RalphConfig {
        struggle: StruggleConfig {
            no_progress_iterations: 2,
        },
        ..RalphConfig::default()
    };
    let invoker = ScriptedInvoker::new(vec![
        ScriptedReply::ok("attempt one"),
        ScriptedReply::ok("attempt two"),
        ScriptedReply::ok("attempt three"),
    ]);

    let outcome = run_loop(&paths, &invoker, &cfg, &request(3), |_| {}).expect("loop");

    assert_eq!(
        outcome.stop,
        LoopStop::MaxIterationsReached { max_iterations: 3 }
    );

    let history = HistoryRecorder::new(&paths.history_path).load().expect("history");
    assert_eq!(history.iterations, 3);
    let reasons: Vec<(u64, StruggleReason)> = history
        .struggle_indicators
        .iter()
        .map(|event| (event.iteration, event.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![
            (2, StruggleReason::NoProgress),
            (3, StruggleReason::NoProgress),
        ]
    );
}

#[test]
fn timeout_records_timeout_exceeded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("hang forever").expect("add");

    let invoker = ScriptedInvoker::new(vec![ScriptedReply::timed_out(30_000)]);
    let outcome = run_loop(
        &paths,
        &invoker,
        &RalphConfig::default(),
        &request(1),
        |_| {},
    )
    .expect("loop");

    assert_eq!(outcome.total_elapsed_ms, 30_000);
    let history = HistoryRecorder::new(&paths.history_path).load().expect("history");
    assert_eq!(history.struggle_indicators.len(), 1);
    assert_eq!(
        history.struggle_indicators[0].reason,
        StruggleReason::TimeoutExceeded
    );
}

/// A stop file aborts before the first invocation and is consumed so the
/// next run starts cleanly.
#[test]
fn stop_file_aborts_and_is_consumed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("never reached").expect("add");
    fs::write(&paths.stop_path, "").expect("drop stop file");

    let invoker = ScriptedInvoker::new(Vec::new());
    let outcome = run_loop(
        &paths,
        &invoker,
        &RalphConfig::default(),
        &request(5),
        |_| {},
    )
    .expect("loop");

    assert_eq!(outcome.iterations_run, 0);
    assert_eq!(
        outcome.stop,
        LoopStop::Aborted {
            before_iteration: 1
        }
    );
    assert!(!paths.stop_path.exists());
    assert!(invoker.requests().is_empty());
}

#[test]
fn start_failure_propagates_as_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (paths, store) = setup(&temp);
    store.add("anything").expect("add");

    let err = run_loop(
        &paths,
        &FailingInvoker,
        &RalphConfig::default(),
        &request(3),
        |_| {},
    )
    .expect_err("agent cannot start");

    assert!(err.to_string().contains("failed to start agent"));
    // Nothing was recorded for the failed start.
    let history = HistoryRecorder::new(&paths.history_path).load().expect("history");
    assert_eq!(history.iterations, 0);
}
