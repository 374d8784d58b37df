//! Log relay: the single writer of the destination log.
//!
//! Producers hold [`Logger`] handles that enqueue [`LogRecord`]s on an
//! unbounded channel. One dedicated thread receives them in delivery order,
//! formats each one and writes it with a single `write_all`, so lines from
//! different producers never interleave. [`RelayMessage::Shutdown`] stops
//! the loop; the sink is flushed before the thread exits.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::log::{LogLevel, LogRecord, Logger};
use crate::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const SOURCE_WIDTH: usize = 13;
const LEVEL_WIDTH: usize = 8;

/// Messages carried by the relay queue.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    Record(LogRecord),
    /// Sentinel: stop receiving and flush.
    Shutdown,
}

/// Counters reported by the relay thread when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Records written to the destination.
    pub written: u64,
    /// Records whose write failed and were reported on the error sink.
    pub failed: u64,
}

/// Handle to the running relay thread.
pub struct LogRelay {
    tx: Sender<RelayMessage>,
    handle: Option<JoinHandle<RelayStats>>,
}

impl LogRelay {
    /// Create (truncating) the log file at `path` and start relaying to it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::LogFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::start(BufWriter::new(file))
    }

    /// Start relaying to `sink`, reporting write failures on stderr.
    pub fn start<W>(sink: W) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        Self::with_error_sink(sink, io::stderr())
    }

    /// Start relaying to `sink`, reporting write failures on `errors`.
    pub fn with_error_sink<W, E>(sink: W, errors: E) -> Result<Self>
    where
        W: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("log-relay".to_string())
            .spawn(move || relay_loop(rx, sink, errors))
            .map_err(Error::RelayStart)?;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// A producer handle tagged with `source`, dropping records below `level`.
    pub fn logger(&self, source: &str, level: LogLevel) -> Logger {
        Logger::new(source, level, self.tx.clone())
    }

    /// Send the sentinel and wait for the relay thread to finish.
    ///
    /// Every record enqueued before this call is written. Records sent
    /// afterwards by outstanding loggers are discarded.
    pub fn shutdown(mut self) -> Result<RelayStats> {
        self.stop()
    }

    fn stop(&mut self) -> Result<RelayStats> {
        let Some(handle) = self.handle.take() else {
            return Ok(RelayStats::default());
        };
        // A send error means the thread is already gone; join tells us how.
        let _ = self.tx.send(RelayMessage::Shutdown);
        handle.join().map_err(|_| Error::RelayPanicked)
    }
}

impl Drop for LogRelay {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn relay_loop<W: Write, E: Write>(rx: Receiver<RelayMessage>, mut sink: W, mut errors: E) -> RelayStats {
    let mut stats = RelayStats::default();

    // recv only fails once every sender is gone, which also ends the run.
    while let Ok(RelayMessage::Record(record)) = rx.recv() {
        match write_record(&mut sink, &record) {
            Ok(()) => stats.written += 1,
            Err(e) => {
                stats.failed += 1;
                let _ = writeln!(
                    errors,
                    "Error in log relay: dropped record from {}: {}",
                    record.source, e
                );
            }
        }
    }

    if let Err(e) = sink.flush() {
        let _ = writeln!(errors, "Error in log relay: final flush failed: {}", e);
    }
    stats
}

fn write_record<W: Write>(sink: &mut W, record: &LogRecord) -> io::Result<()> {
    sink.write_all(format_record(record).as_bytes())?;
    sink.flush()
}

/// Render one record as destination text, including the trailing newline.
///
/// Continuation lines of multi-line messages are indented with a tab, so
/// every line in the log starts with either `[` or a tab.
pub fn format_record(record: &LogRecord) -> String {
    let mut out = format!(
        "[{}][{:<sw$}][{:<lw$}] ",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.source,
        record.level.as_str(),
        sw = SOURCE_WIDTH,
        lw = LEVEL_WIDTH,
    );

    let mut lines = record.message.trim_end().lines();
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push_str("\n\t");
        out.push_str(line);
    }
    out.push('\n');
    out
}
