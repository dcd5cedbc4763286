//! Durable failure log.
//!
//! Every failed or timed-out record is appended as a delimited block holding
//! the record, its bucketed signature, elapsed time and the full raw output.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::invoker::Status;

/// First line of every failure log.
pub const LOG_HEADER: &str = "=== ERROR LOGS ===";

/// Closes each block.
pub const BLOCK_TERMINATOR: &str = "========================================";

/// One failed invocation, as handed to a sink.
#[derive(Debug, Clone, Copy)]
pub struct FailureEntry<'a> {
    pub record: &'a str,
    pub status: Status,
    pub signature: &'a str,
    pub elapsed: Duration,
    pub raw_output: &'a str,
}

/// Destination for failure details.
pub trait FailureSink {
    fn record(&mut self, entry: &FailureEntry<'_>) -> io::Result<()>;
}

/// Append-only failure log file.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    file: File,
}

impl FailureLog {
    /// Create (truncating) the log and write its header.
    pub fn create(path: &Path, run_id: &Uuid) -> io::Result<Self> {
        {
            let mut file = File::create(path)?;
            writeln!(file, "{}", LOG_HEADER)?;
            writeln!(file, "run {} started {}", run_id, Utc::now().to_rfc3339())?;
        }
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FailureSink for FailureLog {
    fn record(&mut self, entry: &FailureEntry<'_>) -> io::Result<()> {
        self.file.write_all(format_block(entry).as_bytes())?;
        self.file.flush()
    }
}

/// Render one log block.
pub fn format_block(entry: &FailureEntry<'_>) -> String {
    let mut block = String::new();
    block.push_str(&format!("\n--- RECORD: {} ---\n", entry.record));
    block.push_str(&format!("STATUS: {}\n", entry.status.as_str()));
    block.push_str(&format!("ERROR: {}\n", entry.signature));
    block.push_str(&format!(
        "Execution time: {:.1} ms\n",
        entry.elapsed.as_secs_f64() * 1000.0
    ));
    if entry.status == Status::Timeout {
        block.push_str("Process was terminated due to timeout\n");
    }
    block.push_str(entry.raw_output);
    block.push('\n');
    block.push_str(BLOCK_TERMINATOR);
    block.push('\n');
    block
}

/// Owned copy of a [`FailureEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFailure {
    pub record: String,
    pub status: Status,
    pub signature: String,
    pub elapsed: Duration,
    pub raw_output: String,
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<CapturedFailure>,
}

impl FailureSink for MemorySink {
    fn record(&mut self, entry: &FailureEntry<'_>) -> io::Result<()> {
        self.entries.push(CapturedFailure {
            record: entry.record.to_string(),
            status: entry.status,
            signature: entry.signature.to_string(),
            elapsed: entry.elapsed,
            raw_output: entry.raw_output.to_string(),
        });
        Ok(())
    }
}
