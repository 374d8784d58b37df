//! MPS benchmark harness.
//!
//! Runs an external LP solver once per input file with a timeout and
//! funnels every log line through a single relay into one log file.

pub mod bench;
pub mod config;
pub mod error;
pub mod inputs;
pub mod log;
pub mod relay;
pub mod solver;
pub mod worker;

pub use bench::{Benchmark, RunSummary};
pub use config::{Config, Settings};
pub use error::{Error, Result};
pub use log::{LogLevel, Logger};
pub use relay::LogRelay;
pub use worker::TaskOutcome;
