//! Full benchmark runs against solver stubs.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use lpbench::Benchmark;

use crate::fixtures::{position, task_messages, Workspace};

const OUTCOME_STUB: &str = r#"
case "$(basename "$2")" in
  a.mps) echo "Objective: -464.7531"; echo "Iterations: 17"; exit 0 ;;
  b.mps) echo "Infeasible" >&2; exit 1 ;;
  *) exit 3 ;;
esac
"#;

/// Test: End-to-end scenario
/// Given a.mps (solver exits 0) and b.mps (solver exits 1) with a 5s timeout
/// When the benchmark runs
/// Then each task logs started -> outcome -> ended in order
#[tokio::test]
async fn test_success_and_non_zero_per_file_order() {
    let ws = Workspace::new();
    ws.add_input("a.mps");
    ws.add_input("b.mps");
    let solver = ws.stub_solver("solver.sh", OUTCOME_STUB);

    let summary = Benchmark::new(ws.settings(&solver, Some(Duration::from_secs(5)), 2))
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.non_zero, 1);

    let records = ws.records();

    let a = task_messages(&records, "a");
    let started = position(&a, |m| m == "Task a started").unwrap();
    let success = position(&a, |m| m == "Task a: success").unwrap();
    let ended = position(&a, |m| m == "Task a ended").unwrap();
    assert!(started < success && success < ended, "bad order: {:?}", a);

    let b = task_messages(&records, "b");
    let started = position(&b, |m| m == "Task b started").unwrap();
    let non_zero = position(&b, |m| m == "Task b: non-zero exit (code 1)").unwrap();
    let ended = position(&b, |m| m == "Task b ended").unwrap();
    assert!(started < non_zero && non_zero < ended, "bad order: {:?}", b);
}

/// Test: N inputs produce N started/ended pairs
#[tokio::test]
async fn test_every_input_gets_one_task() {
    let ws = Workspace::new();
    let names = ["a", "b", "c", "d", "e", "f"];
    for name in names {
        ws.add_input(&format!("{}.mps", name));
    }
    ws.add_input("ignored.txt");
    let solver = ws.stub_solver("solver.sh", OUTCOME_STUB);

    let summary = Benchmark::new(ws.settings(&solver, Some(Duration::from_secs(5)), 3))
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.total, names.len());

    let records = ws.records();
    for name in names {
        let messages = task_messages(&records, name);
        let started = format!("Task {} started", name);
        let ended = format!("Task {} ended", name);
        assert_eq!(messages.iter().filter(|m| **m == started).count(), 1);
        assert_eq!(messages.iter().filter(|m| **m == ended).count(), 1);
        assert_eq!(messages.first(), Some(&started));
        assert_eq!(messages.last(), Some(&ended));
    }
    assert!(task_messages(&records, "ignored").is_empty());
}

/// Test: Solver output is forwarded before the classification line
#[tokio::test]
async fn test_solver_output_is_logged() {
    let ws = Workspace::new();
    ws.add_input("a.mps");
    ws.add_input("b.mps");
    let solver = ws.stub_solver("solver.sh", OUTCOME_STUB);

    Benchmark::new(ws.settings(&solver, Some(Duration::from_secs(5)), 1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let log = ws.log();
    assert!(log.contains("] Objective: -464.7531\n\tIterations: 17\n"));
    for line in log.lines() {
        assert!(
            line.starts_with('[') || line.starts_with('\t'),
            "unexpected log line: {:?}",
            line
        );
    }

    let records = ws.records();
    let b = task_messages(&records, "b");
    let stderr = position(&b, |m| m == "Infeasible").unwrap();
    let outcome = position(&b, |m| m.starts_with("Task b: non-zero")).unwrap();
    assert!(stderr < outcome);
    assert!(records
        .iter()
        .any(|r| r.source == "worker-b" && r.level == "WARN" && r.message == "Infeasible"));
}

/// Test: A solver path that does not exist is a per-task error, not fatal
#[tokio::test]
async fn test_missing_solver_is_logged_per_task() {
    let ws = Workspace::new();
    ws.add_input("a.mps");
    ws.add_input("b.mps");
    let missing = ws.path.join("no-such-solver");

    let summary = Benchmark::new(ws.settings(&missing, Some(Duration::from_secs(5)), 2))
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.errored, 2);

    let records = ws.records();
    for name in ["a", "b"] {
        let messages = task_messages(&records, name);
        assert_eq!(messages.len(), 3, "{:?}", messages);
        assert!(messages[1].starts_with(&format!("Task {}: launch failed", name)));
    }
    assert!(records
        .iter()
        .any(|r| r.level == "ERROR" && r.source == "worker-a"));
}

/// Test: The log file is truncated at the start of each run
#[tokio::test]
async fn test_log_truncated_between_runs() {
    let ws = Workspace::new();
    ws.add_input("a.mps");
    let solver = ws.stub_solver("solver.sh", OUTCOME_STUB);

    for _ in 0..2 {
        Benchmark::new(ws.settings(&solver, Some(Duration::from_secs(5)), 1))
            .run(CancellationToken::new())
            .await
            .unwrap();
    }

    let records = ws.records();
    let runs = records
        .iter()
        .filter(|r| r.source == "main" && r.message.starts_with("Starting benchmark run"))
        .count();
    assert_eq!(runs, 1);
}
