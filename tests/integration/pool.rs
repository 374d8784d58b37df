//! Bounded concurrency, sequential mode and cancellation.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use lpbench::Benchmark;

use crate::fixtures::{task_messages, Workspace};

/// Test: Parallel execution
/// Given 4 inputs whose solver takes 1s each and jobs = 4
/// When the benchmark runs
/// Then the solves overlap
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_jobs_run_concurrently() {
    let ws = Workspace::new();
    for name in ["a", "b", "c", "d"] {
        ws.add_input(&format!("{}.mps", name));
    }
    let solver = ws.stub_solver("solver.sh", "sleep 1\nexit 0");

    let started = Instant::now();
    let summary = Benchmark::new(ws.settings(&solver, Some(Duration::from_secs(10)), 4))
        .run(CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.succeeded, 4);
    assert!(
        elapsed < Duration::from_millis(3500),
        "4 one-second solves with 4 jobs took {:?}",
        elapsed
    );
}

/// Test: One job runs the inputs one at a time in sorted order
#[tokio::test]
async fn test_single_job_runs_in_sorted_order() {
    let ws = Workspace::new();
    for name in ["kb2", "afiro", "sc50a", "adlittle"] {
        ws.add_input(&format!("{}.mps", name));
    }
    let solver = ws.stub_solver("solver.sh", "exit 0");

    let settings = ws.settings(&solver, Some(Duration::from_secs(5)), 8).sequential();
    assert_eq!(settings.jobs, 1);
    Benchmark::new(settings)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let lifecycle: Vec<String> = ws
        .records()
        .into_iter()
        .filter(|r| r.source.starts_with("worker-"))
        .filter(|r| r.message.ends_with(" started") || r.message.ends_with(" ended"))
        .map(|r| r.message)
        .collect();
    assert_eq!(
        lifecycle,
        [
            "Task adlittle started",
            "Task adlittle ended",
            "Task afiro started",
            "Task afiro ended",
            "Task kb2 started",
            "Task kb2 ended",
            "Task sc50a started",
            "Task sc50a ended",
        ]
    );
}

/// Test: Cancelling a run kills in-flight solvers and still reports every task
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_stops_run() {
    let ws = Workspace::new();
    for name in ["a", "b", "c"] {
        ws.add_input(&format!("{}.mps", name));
    }
    let solver = ws.stub_solver("solver.sh", "exec sleep 30");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let summary = Benchmark::new(ws.settings(&solver, None, 1))
        .run(cancel)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(summary.total, 3);
    assert_eq!(summary.cancelled, 3);

    let records = ws.records();
    for name in ["a", "b", "c"] {
        let messages = task_messages(&records, name);
        assert_eq!(
            messages,
            [
                format!("Task {} started", name),
                format!("Task {}: cancelled", name),
                format!("Task {} ended", name),
            ]
        );
    }
}
