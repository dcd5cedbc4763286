//! Batch driver: one invocation per record, strictly in order.

use std::sync::Arc;

use toolsweep_runner::ProcessRunner;

use crate::failure_log::FailureSink;
use crate::invoker::{Invoker, Outcome};
use crate::records::Record;
use crate::signal::SignalState;
use crate::summary::Aggregator;

/// Progress notification for one finished record.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// 1-based position in the input
    pub index: usize,
    pub total: usize,
    pub outcome: &'a Outcome,
}

/// What a drive produced.
#[derive(Debug)]
pub struct DriveResult {
    pub aggregator: Aggregator,
    /// Stopped before the last record on request
    pub interrupted: bool,
}

pub struct Driver<R> {
    invoker: Invoker<R>,
    signals: Option<Arc<SignalState>>,
}

impl<R: ProcessRunner> Driver<R> {
    pub fn new(invoker: Invoker<R>) -> Self {
        Self {
            invoker,
            signals: None,
        }
    }

    /// Stop early once `signals` reports a stop request.
    pub fn with_signals(mut self, signals: Arc<SignalState>) -> Self {
        self.signals = Some(signals);
        self
    }

    fn stop_requested(&self) -> bool {
        self.signals
            .as_ref()
            .map(|s| s.is_stop_requested())
            .unwrap_or(false)
    }

    /// Process `records` in order.
    ///
    /// A stop request is honored between records; the record in flight
    /// always completes and is counted.
    pub fn run<F>(
        &self,
        records: &[Record],
        sink: &mut dyn FailureSink,
        mut on_progress: F,
    ) -> DriveResult
    where
        F: FnMut(Progress<'_>),
    {
        let total = records.len();
        let mut aggregator = Aggregator::new();
        let mut interrupted = false;

        for (i, record) in records.iter().enumerate() {
            if self.stop_requested() {
                tracing::info!(processed = i, total, "stop requested, skipping remaining records");
                interrupted = true;
                break;
            }

            let outcome = self.invoker.invoke(record, sink);
            aggregator.accumulate(&outcome);
            on_progress(Progress {
                index: i + 1,
                total,
                outcome: &outcome,
            });
        }

        tracing::debug!(processed = aggregator.processed(), total, interrupted, "drive finished");
        DriveResult {
            aggregator,
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure_log::MemorySink;
    use crate::invoker::Status;
    use crate::summary::SUCCESS_BUCKET;
    use crate::timeout::TimeoutConfig;
    use std::time::Duration;
    use toolsweep_runner::{CommandSpec, CommandTemplate, RawResult, RunLimits, RunnerResult};

    /// Succeeds for records starting with "ok", fails otherwise.
    struct PrefixRunner;

    impl ProcessRunner for PrefixRunner {
        fn run(&self, cmd: &CommandSpec, _limits: RunLimits) -> RunnerResult<RawResult> {
            let record = cmd.args.last().cloned().unwrap_or_default();
            let ok = record.starts_with("ok");
            Ok(RawResult {
                exit_code: Some(if ok { 0 } else { 1 }),
                output: if ok {
                    String::new()
                } else {
                    format!("Error: cannot decode t_{}", record.len())
                },
                elapsed: Duration::from_millis(1),
                timed_out: false,
            })
        }
    }

    fn driver() -> Driver<PrefixRunner> {
        Driver::new(Invoker::new(
            PrefixRunner,
            CommandTemplate::new("tool", vec!["{record}".into()]),
            ".",
            TimeoutConfig::default(),
        ))
    }

    fn records(names: &[&str]) -> Vec<Record> {
        names.iter().map(|n| Record::new(*n)).collect()
    }

    #[test]
    fn test_runs_all_records_in_order() {
        let mut sink = MemorySink::default();
        let mut seen = Vec::new();
        let result = driver().run(&records(&["ok1", "bad", "ok2", "worse"]), &mut sink, |p| {
            seen.push((p.index, p.total, p.outcome.record().to_string(), p.outcome.status()));
        });

        assert!(!result.interrupted);
        assert_eq!(result.aggregator.processed(), 4);
        assert_eq!(result.aggregator.count(SUCCESS_BUCKET), 2);
        assert_eq!(result.aggregator.count("Error: cannot decode t_XXX"), 2);
        assert_eq!(
            seen,
            vec![
                (1, 4, "ok1".to_string(), Status::Success),
                (2, 4, "bad".to_string(), Status::Fail),
                (3, 4, "ok2".to_string(), Status::Success),
                (4, 4, "worse".to_string(), Status::Fail),
            ]
        );
        assert_eq!(sink.entries.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let result = driver().run(&[], &mut MemorySink::default(), |_| {});
        assert_eq!(result.aggregator.processed(), 0);
        assert!(!result.interrupted);
    }

    #[test]
    fn test_stop_before_start() {
        let signals = Arc::new(SignalState::new());
        signals.request_stop();
        let result = driver()
            .with_signals(signals)
            .run(&records(&["ok1", "ok2"]), &mut MemorySink::default(), |_| {});
        assert!(result.interrupted);
        assert_eq!(result.aggregator.processed(), 0);
    }

    #[test]
    fn test_stop_after_current_record() {
        let signals = Arc::new(SignalState::new());
        let trigger = Arc::clone(&signals);
        let result = driver().with_signals(signals).run(
            &records(&["ok1", "ok2", "ok3"]),
            &mut MemorySink::default(),
            |p| {
                if p.index == 2 {
                    trigger.handle_signal();
                }
            },
        );
        assert!(result.interrupted);
        assert_eq!(result.aggregator.processed(), 2);
    }

    #[test]
    fn test_stop_on_last_record_is_not_interrupted() {
        let signals = Arc::new(SignalState::new());
        let trigger = Arc::clone(&signals);
        let result = driver().with_signals(signals).run(
            &records(&["ok1"]),
            &mut MemorySink::default(),
            |_| trigger.request_stop(),
        );
        assert!(!result.interrupted);
        assert_eq!(result.aggregator.processed(), 1);
    }
}
