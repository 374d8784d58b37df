//! Worker lifecycle: one input file, one solve, one set of log records.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::inputs::InputFile;
use crate::log::Logger;
use crate::solver::{SolveOutcome, SolverCommand};
use crate::{blog, blog_debug, blog_error, blog_warn, Error};

/// How a worker task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The solver ran; see the classification.
    Solved(SolveOutcome),
    /// The solver could not be launched or waited on.
    Errored(String),
    /// The run was interrupted before the solve finished.
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Solved(SolveOutcome::Success))
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Solved(outcome) => fmt::Display::fmt(outcome, f),
            TaskOutcome::Errored(message) => f.write_str(message),
            TaskOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A single input file waiting to be solved.
#[derive(Debug, Clone)]
pub struct WorkerTask {
    input: InputFile,
}

impl WorkerTask {
    pub fn new(input: InputFile) -> Self {
        Self { input }
    }

    pub fn id(&self) -> &str {
        &self.input.id
    }

    pub fn input(&self) -> &InputFile {
        &self.input
    }

    /// Source name used for this task's log records.
    pub fn log_source(&self) -> String {
        format!("worker-{}", self.input.id)
    }

    /// Solve the input, logging `started`, output, outcome and `ended`.
    ///
    /// Never fails: launch errors and cancellation become a [`TaskOutcome`].
    pub async fn run(
        &self,
        solver: &SolverCommand,
        parent: &Logger,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        let logger = parent.named(&self.log_source());
        let id = self.id();

        blog!(logger, "Task {} started", id);
        blog_debug!(
            logger,
            "{} --mps {} --log {}",
            solver.binary().display(),
            self.input.path.display(),
            solver.verbosity()
        );

        let outcome = if cancel.is_cancelled() {
            TaskOutcome::Cancelled
        } else {
            tokio::select! {
                _ = cancel.cancelled() => TaskOutcome::Cancelled,
                result = solver.solve(&self.input.path) => match result {
                    Ok(report) => {
                        if !report.stdout.trim().is_empty() {
                            logger.info(&report.stdout);
                        }
                        if !report.stderr.trim().is_empty() {
                            logger.warn(&report.stderr);
                        }
                        blog_debug!(logger, "Task {} took {:.3}s", id, report.elapsed.as_secs_f64());
                        TaskOutcome::Solved(report.outcome)
                    }
                    Err(e @ Error::Launch { .. }) => TaskOutcome::Errored(format!("launch failed: {}", e)),
                    Err(e) => TaskOutcome::Errored(format!("solver error: {}", e)),
                },
            }
        };

        match &outcome {
            TaskOutcome::Solved(SolveOutcome::Success) => blog!(logger, "Task {}: success", id),
            TaskOutcome::Solved(other) => blog_warn!(logger, "Task {}: {}", id, other),
            TaskOutcome::Errored(message) => blog_error!(logger, "Task {}: {}", id, message),
            TaskOutcome::Cancelled => blog_warn!(logger, "Task {}: cancelled", id),
        }
        blog!(logger, "Task {} ended", id);

        outcome
    }
}
