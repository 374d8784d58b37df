//! External solver invocation.
//!
//! Runs `<binary> --mps <input> --log <verbosity>` once, captures stdout and
//! stderr, and classifies the result. A solver that outlives the timeout is
//! killed along with its process group and reaped before
//! [`SolverCommand::solve`] returns.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant as TokioInstant};

use crate::{Error, Result};

/// How long to keep reading pipes after a timed-out solver was killed.
/// A process that left the solver's group may still hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Classification of one finished solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// Exit code 0.
    Success,
    /// Any other termination. `code` is `None` when a signal ended the process.
    NonZero {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// The solver ran longer than the bound and was killed.
    Timeout(Duration),
}

impl SolveOutcome {
    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return SolveOutcome::Success;
        }
        SolveOutcome::NonZero {
            code: status.code(),
            signal: exit_signal(status),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SolveOutcome::Success)
    }
}

impl fmt::Display for SolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveOutcome::Success => write!(f, "success"),
            SolveOutcome::NonZero {
                code: Some(code), ..
            } => write!(f, "non-zero exit (code {})", code),
            SolveOutcome::NonZero {
                signal: Some(signal),
                ..
            } => write!(f, "non-zero exit (signal {})", signal),
            SolveOutcome::NonZero { .. } => write!(f, "non-zero exit"),
            SolveOutcome::Timeout(limit) => write!(f, "timeout after {:.2}s", limit.as_secs_f64()),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Everything captured from one solver run.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub outcome: SolveOutcome,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// A configured solver executable.
#[derive(Debug, Clone)]
pub struct SolverCommand {
    binary: PathBuf,
    verbosity: String,
    timeout: Option<Duration>,
}

impl SolverCommand {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            verbosity: crate::config::DEFAULT_VERBOSITY.to_string(),
            timeout: None,
        }
    }

    /// Set the value passed to the solver's `--log` flag.
    pub fn with_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Bound each solve; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn verbosity(&self) -> &str {
        &self.verbosity
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Arguments passed to the solver for `input`.
    pub fn args<'a>(&'a self, input: &'a Path) -> [&'a OsStr; 4] {
        [
            OsStr::new("--mps"),
            input.as_os_str(),
            OsStr::new("--log"),
            OsStr::new(&self.verbosity),
        ]
    }

    /// Run the solver once against `input`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the process cannot be created, or
    /// [`Error::Io`] if waiting on or killing it fails. Non-zero exits and
    /// timeouts are reported through [`SolveOutcome`], not as errors.
    pub async fn solve(&self, input: &Path) -> Result<SolveReport> {
        let started = Instant::now();
        let mut command = Command::new(&self.binary);
        command
            .args(self.args(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout reaches whatever the solver spawned.
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn().map_err(|source| Error::Launch {
            binary: self.binary.clone(),
            source,
        })?;
        let mut group = GroupGuard::new(child.id());

        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let outcome = match self.timeout {
            None => SolveOutcome::from_status(child.wait().await?),
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => SolveOutcome::from_status(status?),
                Err(_) => {
                    group.kill();
                    // kill() sends SIGKILL and waits for the process to exit.
                    child.kill().await?;
                    SolveOutcome::Timeout(limit)
                }
            },
        };
        group.disarm();
        let elapsed = started.elapsed();

        let grace = match outcome {
            SolveOutcome::Timeout(_) => Some(DRAIN_GRACE),
            _ => None,
        };
        let (stdout, stderr) = drain_pipes(stdout, stderr, grace).await?;
        Ok(SolveReport {
            outcome,
            stdout,
            stderr,
            elapsed,
        })
    }
}

/// SIGKILLs the solver's process group if dropped while still armed.
///
/// A cancelled solve drops its future mid-wait; `kill_on_drop` only reaches
/// the direct child.
struct GroupGuard {
    pgid: Option<u32>,
    armed: bool,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid, armed: true }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid {
            kill_group(pgid);
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.kill();
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    // ESRCH means the whole group is already gone.
    let _ = killpg(Pid::from_raw(raw), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    // Keep whatever arrived before a read error.
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

/// Collect both pipes. With a grace period, both share one deadline and a
/// pipe still open when it passes comes back empty.
async fn drain_pipes(
    stdout: JoinHandle<String>,
    stderr: JoinHandle<String>,
    grace: Option<Duration>,
) -> Result<(String, String)> {
    let deadline = grace.map(|grace| TokioInstant::now() + grace);
    Ok((
        collect_pipe(stdout, deadline).await?,
        collect_pipe(stderr, deadline).await?,
    ))
}

async fn collect_pipe(
    mut handle: JoinHandle<String>,
    deadline: Option<TokioInstant>,
) -> Result<String> {
    let joined = match deadline {
        None => handle.await,
        Some(deadline) => match timeout_at(deadline, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Ok(String::new());
            }
        },
    };
    joined.map_err(|e| Error::TaskJoin(e.to_string()))
}

/// Locate `binary` on `PATH` when it is a bare name; otherwise use it as-is.
///
/// A name that cannot be found is returned unchanged so the failure
/// surfaces when the solver is launched.
pub fn resolve_binary(binary: &Path) -> PathBuf {
    if binary.components().count() != 1 || binary.is_absolute() {
        return binary.to_path_buf();
    }
    which::which(binary).unwrap_or_else(|_| binary.to_path_buf())
}
