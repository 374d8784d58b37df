use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use lpbench::config::Config;
use lpbench::{Benchmark, Result, RunSummary};

/// lpbench - run an LP solver over a directory of MPS files
#[derive(Parser, Debug)]
#[command(name = "lpbench")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    LPBENCH_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Config file (default: ~/.lpbench/config.toml)
    #[arg(short = 'c', long, global = true, env = "LPBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging in the benchmark log
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Solver executable, a path or a name on PATH
    #[arg(long, global = true, env = "LPBENCH_SOLVER")]
    pub solver: Option<String>,

    /// Directory containing the input files
    #[arg(long, global = true, env = "LPBENCH_INPUT_DIR")]
    pub input_dir: Option<String>,

    /// Input file extension
    #[arg(long, global = true)]
    pub extension: Option<String>,

    /// Destination log file, truncated at the start of each run
    #[arg(long, global = true, env = "LPBENCH_LOG_FILE")]
    pub log_file: Option<String>,

    /// Value passed to the solver's --log flag
    #[arg(long, global = true)]
    pub verbosity: Option<String>,

    /// Per-solve timeout in seconds (ignored by `sequential`)
    #[arg(long, global = true, env = "LPBENCH_TIMEOUT")]
    pub timeout: Option<f64>,

    /// Maximum concurrent solves (ignored by `sequential`)
    #[arg(short = 'j', long, global = true, env = "LPBENCH_JOBS")]
    pub jobs: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Exit with status 1 if any solve did not succeed
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Benchmark modes
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Solve with a bounded pool of concurrent jobs and a timeout (default)
    Run,

    /// Solve one file at a time with no timeout
    Sequential,
}

impl Cli {
    fn overrides(&self) -> Config {
        Config {
            solver: self.solver.clone(),
            input_dir: self.input_dir.clone(),
            extension: self.extension.clone(),
            log_file: self.log_file.clone(),
            timeout_secs: self.timeout,
            jobs: self.jobs,
            verbosity: self.verbosity.clone(),
            debug: self.debug,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_benchmark(&cli) {
        Ok(summary) if strict_failure(&summary, cli.strict) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lpbench: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run_benchmark(cli: &Cli) -> Result<RunSummary> {
    let file = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut settings = file.merge(cli.overrides()).into_settings()?;
    settings.debug = lpbench::log::debug_requested(settings.debug);
    if cli.command == Some(Command::Sequential) {
        settings = settings.sequential();
    }
    let log_file = settings.log_file.clone();

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("lpbench: interrupted, stopping solvers");
                on_interrupt.cancel();
            }
        });
        Benchmark::new(settings).run(cancel).await
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Run {}", summary.run_id);
        println!("  {}", summary);
        println!("  Log: {}", log_file.display());
    }
    Ok(summary)
}

fn strict_failure(summary: &RunSummary, strict: bool) -> bool {
    strict && !summary.all_succeeded()
}
