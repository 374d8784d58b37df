//! Benchmark orchestrator.
//!
//! A run starts the log relay, discovers the inputs, drives one
//! [`WorkerTask`] per input through a pool of at most `jobs` concurrent
//! solves, and shuts the relay down once every task has reported.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Settings;
use crate::inputs::discover;
use crate::log::{LogLevel, Logger};
use crate::relay::LogRelay;
use crate::solver::{SolveOutcome, SolverCommand};
use crate::worker::{TaskOutcome, WorkerTask};
use crate::{blog, blog_debug, blog_error, blog_warn, Error, Result};

/// Outcome counts for one run. Kept in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub non_zero: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub cancelled: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.total += 1;
        match outcome {
            TaskOutcome::Solved(SolveOutcome::Success) => self.succeeded += 1,
            TaskOutcome::Solved(SolveOutcome::NonZero { .. }) => self.non_zero += 1,
            TaskOutcome::Solved(SolveOutcome::Timeout(_)) => self.timed_out += 1,
            TaskOutcome::Errored(_) => self.errored += 1,
            TaskOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Number of tasks that did not end in a successful solve.
    pub fn unsuccessful(&self) -> usize {
        self.total - self.succeeded
    }

    pub fn all_succeeded(&self) -> bool {
        self.unsuccessful() == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tasks: {} succeeded, {} non-zero, {} timed out, {} errored, {} cancelled ({:.1}s)",
            self.total,
            self.succeeded,
            self.non_zero,
            self.timed_out,
            self.errored,
            self.cancelled,
            self.elapsed.as_secs_f64()
        )
    }
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// One configured benchmark run.
pub struct Benchmark {
    settings: Settings,
    solver: SolverCommand,
}

impl Benchmark {
    pub fn new(settings: Settings) -> Self {
        let solver = SolverCommand::new(settings.solver.clone())
            .with_verbosity(settings.verbosity.clone())
            .with_timeout(settings.timeout);
        Self { settings, solver }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Execute the run, logging to the configured log file.
    ///
    /// # Errors
    ///
    /// Only fatal conditions are errors: the log file cannot be created,
    /// the input directory cannot be read, or the relay thread dies.
    /// Individual solve failures are reported in the summary.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let relay = LogRelay::open(&self.settings.log_file)?;
        let logger = relay.logger("main", LogLevel::for_debug(self.settings.debug));

        let result = self.dispatch(&logger, &cancel).await;
        drop(logger);

        // Joining the relay thread blocks until the log is flushed.
        let stats = tokio::task::spawn_blocking(move || relay.shutdown())
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))??;
        if stats.failed > 0 {
            eprintln!("lpbench: {} log records could not be written", stats.failed);
        }
        result
    }

    async fn dispatch(&self, logger: &Logger, cancel: &CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new(Uuid::new_v4());

        blog!(logger, "Starting benchmark run {}", summary.run_id);
        blog_debug!(
            logger,
            "solver={} input_dir={} extension={} timeout={:?} jobs={} verbosity={}",
            self.settings.solver.display(),
            self.settings.input_dir.display(),
            self.settings.extension,
            self.settings.timeout,
            self.settings.jobs,
            self.settings.verbosity
        );

        let inputs = match discover(&self.settings.input_dir, &self.settings.extension) {
            Ok(inputs) => inputs,
            Err(e) => {
                blog_error!(logger, "{}", e);
                return Err(e);
            }
        };
        if inputs.is_empty() {
            blog_warn!(
                logger,
                "No *.{} files in {}",
                self.settings.extension,
                self.settings.input_dir.display()
            );
        } else {
            blog!(
                logger,
                "Solving {} files with up to {} concurrent jobs",
                inputs.len(),
                self.settings.jobs
            );
        }

        let jobs = self.settings.jobs.max(1);
        let mut outcomes = stream::iter(inputs.into_iter().map(WorkerTask::new))
            .map(|task| async move {
                let outcome = task.run(&self.solver, logger, cancel).await;
                (task, outcome)
            })
            .buffer_unordered(jobs);

        while let Some((task, outcome)) = outcomes.next().await {
            blog_debug!(logger, "Task {} finished: {}", task.id(), outcome);
            summary.record(&outcome);
        }

        summary.elapsed = started.elapsed();
        blog!(logger, "Benchmark finished: {}", summary);
        Ok(summary)
    }
}
