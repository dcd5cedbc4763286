//! Streaming aggregation of outcomes.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::invoker::{Outcome, Status};

/// Bucket key under which successes are counted.
pub const SUCCESS_BUCKET: &str = "SUCCESS";

/// One entry of the latency series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub elapsed: Duration,
    pub status: Status,
}

/// Count and share of one signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub signature: String,
    pub count: u64,
    /// Percentage of all processed records
    pub percentage: f64,
}

/// Latency figures in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Element `len / 2` of the ascending series (lower-middle for even
    /// lengths, not the average of the two middle values)
    pub median_ms: f64,
}

impl LatencyStats {
    /// Stats over `samples`, or `None` when empty.
    pub fn from_millis(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        Some(Self {
            count,
            mean_ms: sorted.iter().sum::<f64>() / count as f64,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            median_ms: sorted[count / 2],
        })
    }
}

/// Point-in-time view of an [`Aggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Records processed so far
    pub total: u64,
    /// Buckets by descending count, ties in first-seen order
    pub buckets: Vec<BucketCount>,
    /// Latency of successful runs
    pub success: Option<LatencyStats>,
    /// Latency of failed runs (timeouts and crashes excluded)
    pub fail: Option<LatencyStats>,
    pub timeouts: u64,
    pub crashes: u64,
}

/// Owns the frequency table and latency series for a run.
///
/// State changes only through [`Aggregator::accumulate`]. A parallel driver
/// must funnel outcomes to a single owner rather than share this value.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    /// (signature, count) in first-seen order
    buckets: Vec<(String, u64)>,
    index: HashMap<String, usize>,
    samples: Vec<Sample>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one outcome into the tally.
    pub fn accumulate(&mut self, outcome: &Outcome) {
        let key = match outcome.status() {
            Status::Success => SUCCESS_BUCKET,
            _ => outcome.signature(),
        };
        match self.index.get(key) {
            Some(&i) => self.buckets[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.buckets.len());
                self.buckets.push((key.to_string(), 1));
            }
        }
        self.samples.push(Sample {
            elapsed: outcome.elapsed(),
            status: outcome.status(),
        });
    }

    /// Number of outcomes accumulated.
    pub fn processed(&self) -> u64 {
        self.samples.len() as u64
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Count for one bucket key.
    pub fn count(&self, key: &str) -> u64 {
        self.index.get(key).map(|&i| self.buckets[i].1).unwrap_or(0)
    }

    fn count_status(&self, status: Status) -> u64 {
        self.samples.iter().filter(|s| s.status == status).count() as u64
    }

    fn latency(&self, status: Status) -> Option<LatencyStats> {
        let millis: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.elapsed.as_secs_f64() * 1000.0)
            .collect();
        LatencyStats::from_millis(&millis)
    }

    /// Summarize without changing state.
    pub fn report(&self) -> Summary {
        let total = self.processed();

        let mut ranked: Vec<&(String, u64)> = self.buckets.iter().collect();
        // Stable sort keeps first-seen order among equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let buckets = ranked
            .into_iter()
            .map(|(signature, count)| BucketCount {
                signature: signature.clone(),
                count: *count,
                percentage: if total == 0 {
                    0.0
                } else {
                    *count as f64 * 100.0 / total as f64
                },
            })
            .collect();

        Summary {
            total,
            buckets,
            success: self.latency(Status::Success),
            fail: self.latency(Status::Fail),
            timeouts: self.count_status(Status::Timeout),
            crashes: self.count_status(Status::Crash),
        }
    }
}
