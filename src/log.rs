//! Structured logging for benchmark runs.
//!
//! Log levels:
//! - ERROR: A task could not run at all (solver failed to launch)
//! - WARN: Unexpected but recoverable conditions (solver stderr, empty input dir)
//! - INFO: Run and task lifecycle (started, outcome, ended, summary)
//! - DEBUG: Detailed traces (command lines, timings, settings)
//!
//! Every component logs through a [`Logger`] handed to it at construction.
//! A logger only produces records: it enqueues them to the [`LogRelay`]
//! which owns the destination and is the only writer.
//!
//! Debug mode can be enabled with `--debug` flag or `LPBENCH_DEBUG=1` env var.
//!
//! [`LogRelay`]: crate::relay::LogRelay

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};
use crossbeam_channel::Sender;

use crate::relay::RelayMessage;

/// Log levels for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Minimum level for a run: DEBUG when requested, INFO otherwise.
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether debug logging was requested by flag or by `LPBENCH_DEBUG`.
pub fn debug_requested(flag: bool) -> bool {
    let env_debug = std::env::var("LPBENCH_DEBUG")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false);
    flag || env_debug
}

/// One log line on its way from a producer to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub source: Arc<str>,
    pub level: LogLevel,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogRecord {
    pub fn new(source: impl Into<Arc<str>>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            level,
            timestamp: Local::now(),
            message: message.into(),
        }
    }
}

/// Producer side of the log relay.
///
/// Cheap to clone. Records below the logger's level are dropped before
/// they are enqueued. Once the relay has shut down, records are discarded.
#[derive(Debug, Clone)]
pub struct Logger {
    source: Arc<str>,
    level: LogLevel,
    tx: Sender<RelayMessage>,
}

impl Logger {
    pub(crate) fn new(source: &str, level: LogLevel, tx: Sender<RelayMessage>) -> Self {
        Self {
            source: Arc::from(source),
            level,
            tx,
        }
    }

    /// A logger feeding the same relay under a different source name.
    pub fn named(&self, source: &str) -> Self {
        Self {
            source: Arc::from(source),
            level: self.level,
            tx: self.tx.clone(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level
    }

    /// Log a message at the specified level.
    ///
    /// Returns `true` if the record was handed to the relay.
    pub fn log_at(&self, level: LogLevel, msg: &str) -> bool {
        if !self.enabled(level) {
            return false;
        }
        let record = LogRecord::new(Arc::clone(&self.source), level, msg);
        self.tx.send(RelayMessage::Record(record)).is_ok()
    }

    pub fn error(&self, msg: &str) {
        self.log_at(LogLevel::Error, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.log_at(LogLevel::Warn, msg);
    }

    pub fn info(&self, msg: &str) {
        self.log_at(LogLevel::Info, msg);
    }

    pub fn debug(&self, msg: &str) {
        self.log_at(LogLevel::Debug, msg);
    }
}

/// Log macro for INFO level.
#[macro_export]
macro_rules! blog {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

/// Log macro for ERROR level.
#[macro_export]
macro_rules! blog_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
    };
}

/// Log macro for WARN level.
#[macro_export]
macro_rules! blog_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

/// Log macro for DEBUG level. The message is only formatted when enabled.
#[macro_export]
macro_rules! blog_debug {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled($crate::log::LogLevel::Debug) {
            $logger.debug(&format!($($arg)*))
        }
    };
}
