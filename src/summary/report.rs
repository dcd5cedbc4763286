//! Run report (console text and JSON)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::aggregator::{LatencyStats, Summary};

/// Schema version for the JSON run report
pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for the JSON run report
pub const RUN_REPORT_SCHEMA_ID: &str = "toolsweep/run_report@1";

/// Final report of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub schema_id: String,

    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Deadline applied to each invocation
    pub timeout_ms: u64,

    /// Records in the input, processed or not
    pub records_total: u64,

    /// The run stopped early on an interrupt
    pub interrupted: bool,

    /// Where failure details were written
    pub log_path: PathBuf,

    pub summary: Summary,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        timeout_ms: u64,
        records_total: u64,
        interrupted: bool,
        log_path: PathBuf,
        summary: Summary,
    ) -> Self {
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            schema_id: RUN_REPORT_SCHEMA_ID.to_string(),
            run_id,
            started_at,
            finished_at: Utc::now(),
            timeout_ms,
            records_total,
            interrupted,
            log_path,
            summary,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write JSON to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }

    /// Human-readable rendering
    pub fn to_human(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();

        let _ = writeln!(out, "FINAL STATISTICS");
        let _ = writeln!(out);
        if self.interrupted {
            let _ = writeln!(
                out,
                "Interrupted: processed {} of {} records",
                s.total, self.records_total
            );
        }
        let _ = writeln!(out, "Total records: {}", s.total);

        if s.timeouts > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "Terminated by timeout: {}", s.timeouts);
            let _ = writeln!(
                out,
                "Timeout threshold: {} seconds",
                self.timeout_ms as f64 / 1000.0
            );
        }
        if s.crashes > 0 {
            let _ = writeln!(out, "Harness errors: {}", s.crashes);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Results:");
        for bucket in &s.buckets {
            let _ = writeln!(
                out,
                "{:4} ({:5.1}%) | {}",
                bucket.count, bucket.percentage, bucket.signature
            );
        }

        if let Some(ref stats) = s.success {
            let _ = writeln!(out);
            let _ = writeln!(out, "Execution time (successful):");
            write_latency(&mut out, "successful", stats);
        }
        if let Some(ref stats) = s.fail {
            let _ = writeln!(out);
            let _ = writeln!(out, "Execution time (failed):");
            write_latency(&mut out, "failed", stats);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Detailed error logs: {}", self.log_path.display());
        out
    }
}

fn write_latency(out: &mut String, label: &str, stats: &LatencyStats) {
    let _ = writeln!(out, "  Total {}: {}", label, stats.count);
    let _ = writeln!(out, "  Mean: {:.1} ms", stats.mean_ms);
    let _ = writeln!(out, "  Min: {:.1} ms", stats.min_ms);
    let _ = writeln!(out, "  Max: {:.1} ms", stats.max_ms);
    let _ = writeln!(out, "  Median: {:.1} ms", stats.median_ms);
}
