//! toolsweep - batch robustness harness for command-line tools
//!
//! Runs an external tool once per input record under a hard deadline,
//! classifies every run, buckets failures by a normalized error signature
//! and reports frequency and latency statistics.

pub mod config;
pub mod driver;
pub mod failure_log;
pub mod invoker;
pub mod records;
pub mod signal;
pub mod summary;
pub mod telemetry;
pub mod timeout;

pub use config::{ConfigError, ConfigOverrides, EffectiveConfig, HarnessConfig};
pub use driver::{DriveResult, Driver, Progress};
pub use failure_log::{FailureEntry, FailureLog, FailureSink, MemorySink};
pub use invoker::{Invoker, Outcome, Status};
pub use records::{load_records, parse_records, Record, RecordError};
pub use summary::{Aggregator, RunReport, Summary};
pub use timeout::TimeoutConfig;
