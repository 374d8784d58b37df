use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::solver::resolve_binary;
use crate::{Error, Result};

pub const DEFAULT_SOLVER: &str = "jsolver_app";
pub const DEFAULT_INPUT_DIR: &str = "mps";
pub const DEFAULT_EXTENSION: &str = "mps";
pub const DEFAULT_LOG_FILE: &str = "benchmark.log";
pub const DEFAULT_TIMEOUT_SECS: f64 = 600.0;
pub const DEFAULT_VERBOSITY: &str = "info";

/// Benchmark configuration as read from `~/.lpbench/config.toml` or built
/// from command-line flags. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub solver: Option<String>,
    pub input_dir: Option<String>,
    pub extension: Option<String>,
    pub log_file: Option<String>,
    pub timeout_secs: Option<f64>,
    pub jobs: Option<usize>,
    pub verbosity: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub solver: PathBuf,
    pub input_dir: PathBuf,
    /// Input file extension without the leading dot.
    pub extension: String,
    pub log_file: PathBuf,
    /// `None` waits for the solver indefinitely.
    pub timeout: Option<Duration>,
    pub jobs: usize,
    /// Value passed to the solver's `--log` flag.
    pub verbosity: String,
    pub debug: bool,
}

impl Config {
    pub fn lpbench_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".lpbench"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::lpbench_dir()?.join("config.toml"))
    }

    /// Load the default config file, or defaults if there is none.
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(path) => path,
            Err(Error::NoHomeDir) => return Ok(Self::default()),
            Err(e) => return Err(e),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicitly named config file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            solver: overrides.solver.or(self.solver),
            input_dir: overrides.input_dir.or(self.input_dir),
            extension: overrides.extension.or(self.extension),
            log_file: overrides.log_file.or(self.log_file),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            jobs: overrides.jobs.or(self.jobs),
            verbosity: overrides.verbosity.or(self.verbosity),
            debug: overrides.debug || self.debug,
        }
    }

    /// Apply built-in defaults and validate.
    pub fn into_settings(self) -> Result<Settings> {
        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(Error::Config(format!(
                "timeout must be a positive number of seconds, got {}",
                timeout_secs
            )));
        }
        let timeout = Duration::try_from_secs_f64(timeout_secs).map_err(|e| {
            Error::Config(format!("timeout of {} seconds is out of range: {}", timeout_secs, e))
        })?;

        let jobs = self.jobs.unwrap_or_else(default_jobs);
        if jobs == 0 {
            return Err(Error::Config("jobs must be at least 1".to_string()));
        }

        let extension = self
            .extension
            .as_deref()
            .unwrap_or(DEFAULT_EXTENSION)
            .trim_start_matches('.')
            .to_string();
        if extension.is_empty() {
            return Err(Error::Config("extension must not be empty".to_string()));
        }

        let solver = self.solver.as_deref().unwrap_or(DEFAULT_SOLVER);
        Ok(Settings {
            solver: resolve_binary(&expand_tilde(solver)),
            input_dir: expand_tilde(self.input_dir.as_deref().unwrap_or(DEFAULT_INPUT_DIR)),
            extension,
            log_file: expand_tilde(self.log_file.as_deref().unwrap_or(DEFAULT_LOG_FILE)),
            timeout: Some(timeout),
            jobs,
            verbosity: self
                .verbosity
                .unwrap_or_else(|| DEFAULT_VERBOSITY.to_string()),
            debug: self.debug,
        })
    }
}

impl Settings {
    /// The one-solve-at-a-time, no-timeout variant of these settings.
    pub fn sequential(mut self) -> Self {
        self.jobs = 1;
        self.timeout = None;
        self
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
