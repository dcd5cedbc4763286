//! Outcome aggregation and run reporting.

mod aggregator;
mod report;

pub use aggregator::{Aggregator, BucketCount, LatencyStats, Sample, Summary, SUCCESS_BUCKET};
pub use report::{RunReport, RUN_REPORT_SCHEMA_ID, RUN_REPORT_SCHEMA_VERSION};
