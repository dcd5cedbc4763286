//! Per-record invocation and classification.
//!
//! One call runs the tool for one record and turns whatever happened into an
//! [`Outcome`]:
//!
//! ```text
//! Started ─┬─ Running ─┬─ Completed (Success | Fail)
//!          │           └─ TimedOut  (Timeout)
//!          └─ LaunchFailed          (Crash)
//! ```
//!
//! Nothing escapes this boundary. Launch errors, wait errors and panics while
//! orchestrating all become `Crash` outcomes so the batch keeps going.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use toolsweep_runner::{CommandTemplate, ProcessRunner, RawResult, RunnerError};

use crate::failure_log::{FailureEntry, FailureSink};
use crate::records::Record;
use crate::timeout::TimeoutConfig;

/// Prefix of the signature for harness faults.
pub const CRASH_PREFIX: &str = "Harness error: ";

/// Classification of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Tool exited 0
    Success,
    /// Tool ran and exited non-zero
    Fail,
    /// Tool exceeded the deadline and was killed
    Timeout,
    /// The harness could not complete the invocation
    Crash,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Fail => "FAIL",
            Status::Timeout => "TIMEOUT",
            Status::Crash => "CRASH",
        }
    }
}

/// Result of one invocation. The signature is empty exactly when the status
/// is `Success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    record: Record,
    status: Status,
    signature: String,
    elapsed: Duration,
}

impl Outcome {
    pub fn success(record: Record, elapsed: Duration) -> Self {
        Self {
            record,
            status: Status::Success,
            signature: String::new(),
            elapsed,
        }
    }

    /// A non-success outcome. An empty signature is replaced with the
    /// extractor's unknown-error sentinel.
    pub fn failure(
        record: Record,
        status: Status,
        signature: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        debug_assert!(status != Status::Success);
        let mut signature = signature.into();
        if signature.is_empty() {
            signature = toolsweep_signature::UNKNOWN_ERROR.to_string();
        }
        Self {
            record,
            status,
            signature,
            elapsed,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Runs the tool for single records.
pub struct Invoker<R> {
    runner: R,
    template: CommandTemplate,
    working_dir: PathBuf,
    timeouts: TimeoutConfig,
}

impl<R: ProcessRunner> Invoker<R> {
    pub fn new(
        runner: R,
        template: CommandTemplate,
        working_dir: impl Into<PathBuf>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            runner,
            template,
            working_dir: working_dir.into(),
            timeouts,
        }
    }

    /// Run the tool for `record` and classify the result.
    ///
    /// Fail and Timeout details go to `sink`; a sink error is logged and
    /// does not change the outcome.
    pub fn invoke(&self, record: &Record, sink: &mut dyn FailureSink) -> Outcome {
        let start = Instant::now();
        let cmd = self.template.render(record.as_str(), &self.working_dir);
        let limits = self.timeouts.limits();

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(&cmd, limits)));

        let (status, signature, raw_output) = match attempt {
            Ok(Ok(raw)) => self.classify(raw),
            Ok(Err(e)) => (Status::Crash, crash_signature(&e), String::new()),
            Err(payload) => (
                Status::Crash,
                format!("{}{}", CRASH_PREFIX, panic_message(payload.as_ref())),
                String::new(),
            ),
        };
        let elapsed = start.elapsed();

        tracing::debug!(
            record = %record,
            status = status.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "invocation classified"
        );

        if matches!(status, Status::Fail | Status::Timeout) {
            let entry = FailureEntry {
                record: record.as_str(),
                status,
                signature: &signature,
                elapsed,
                raw_output: &raw_output,
            };
            if let Err(e) = sink.record(&entry) {
                tracing::warn!(record = %record, error = %e, "failed to write failure log entry");
            }
        }

        match status {
            Status::Success => Outcome::success(record.clone(), elapsed),
            _ => Outcome::failure(record.clone(), status, signature, elapsed),
        }
    }

    fn classify(&self, raw: RawResult) -> (Status, String, String) {
        if raw.timed_out {
            (Status::Timeout, self.timeouts.signature(), raw.output)
        } else if raw.exit_code == Some(0) {
            (Status::Success, String::new(), raw.output)
        } else {
            let signature = toolsweep_signature::bucket(&raw.output);
            (Status::Fail, signature, raw.output)
        }
    }
}

fn crash_signature(error: &RunnerError) -> String {
    format!("{}{}", CRASH_PREFIX, error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic while running tool".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure_log::MemorySink;
    use std::cell::RefCell;
    use std::io;
    use toolsweep_runner::{CommandSpec, RunLimits, RunnerResult};

    /// Returns a canned result and remembers the command it was given.
    struct FakeRunner {
        result: fn() -> RunnerResult<RawResult>,
        seen: RefCell<Vec<CommandSpec>>,
    }

    impl FakeRunner {
        fn new(result: fn() -> RunnerResult<RawResult>) -> Self {
            Self {
                result,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, cmd: &CommandSpec, _limits: RunLimits) -> RunnerResult<RawResult> {
            self.seen.borrow_mut().push(cmd.clone());
            (self.result)()
        }
    }

    fn raw(exit_code: Option<i32>, output: &str, timed_out: bool) -> RawResult {
        RawResult {
            exit_code,
            output: output.to_string(),
            elapsed: Duration::from_millis(5),
            timed_out,
        }
    }

    fn invoker(result: fn() -> RunnerResult<RawResult>) -> Invoker<FakeRunner> {
        Invoker::new(
            FakeRunner::new(result),
            CommandTemplate::new("tool", vec!["tac".into(), "--address".into(), "{record}".into()]),
            "/work",
            TimeoutConfig::default(),
        )
    }

    #[test]
    fn test_success() {
        let inv = invoker(|| Ok(raw(Some(0), "", false)));
        let mut sink = MemorySink::default();
        let outcome = inv.invoke(&Record::new("EQA1"), &mut sink);

        assert_eq!(outcome.status(), Status::Success);
        assert_eq!(outcome.signature(), "");
        assert!(sink.entries.is_empty());

        let seen = inv.runner.seen.borrow();
        assert_eq!(seen[0].args, vec!["tac", "--address", "EQA1"]);
        assert_eq!(seen[0].cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_fail_uses_bucketed_signature() {
        let inv = invoker(|| {
            Ok(raw(
                Some(1),
                "> Task :run\njava.lang.IllegalArgumentException: bad var_17 at arg3\n",
                false,
            ))
        });
        let mut sink = MemorySink::default();
        let outcome = inv.invoke(&Record::new("EQA2"), &mut sink);

        assert_eq!(outcome.status(), Status::Fail);
        assert_eq!(outcome.signature(), "bad var_XXX at argXXX");
        assert_eq!(sink.entries.len(), 1);
        assert_eq!(sink.entries[0].record, "EQA2");
        assert!(sink.entries[0].raw_output.contains("IllegalArgumentException"));
    }

    #[test]
    fn test_signal_death_is_fail() {
        let inv = invoker(|| Ok(raw(None, "exit code 137", false)));
        let outcome = inv.invoke(&Record::new("x"), &mut MemorySink::default());
        assert_eq!(outcome.status(), Status::Fail);
        assert_eq!(outcome.signature(), "Unknown error (last line): exit code 137");
    }

    #[test]
    fn test_timeout_uses_literal_signature() {
        let inv = invoker(|| Ok(raw(None, "java.lang.IllegalStateException: ignored", true)));
        let mut sink = MemorySink::default();
        let outcome = inv.invoke(&Record::new("slow"), &mut sink);

        assert_eq!(outcome.status(), Status::Timeout);
        assert_eq!(outcome.signature(), "Timeout after 30 seconds");
        assert_eq!(sink.entries.len(), 1);
        assert_eq!(sink.entries[0].status, Status::Timeout);
    }

    #[test]
    fn test_launch_failure_is_crash() {
        let inv = invoker(|| {
            Err(RunnerError::SpawnFailed {
                program: "tool".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            })
        });
        let mut sink = MemorySink::default();
        let outcome = inv.invoke(&Record::new("x"), &mut sink);

        assert_eq!(outcome.status(), Status::Crash);
        assert!(outcome.signature().starts_with(CRASH_PREFIX));
        assert!(outcome.signature().contains("failed to launch `tool`"));
        assert!(sink.entries.is_empty());
    }

    #[test]
    fn test_runner_panic_is_crash() {
        let inv = invoker(|| panic!("runner blew up"));
        let outcome = inv.invoke(&Record::new("x"), &mut MemorySink::default());
        assert_eq!(outcome.status(), Status::Crash);
        assert_eq!(outcome.signature(), "Harness error: runner blew up");
    }

    struct BrokenSink;

    impl FailureSink for BrokenSink {
        fn record(&mut self, _entry: &FailureEntry<'_>) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_sink_error_does_not_change_outcome() {
        let inv = invoker(|| Ok(raw(Some(2), "Error: boom", false)));
        let outcome = inv.invoke(&Record::new("x"), &mut BrokenSink);
        assert_eq!(outcome.status(), Status::Fail);
        assert_eq!(outcome.signature(), "Error: boom");
    }

    #[test]
    fn test_signature_invariant() {
        let ok = Outcome::success(Record::new("a"), Duration::ZERO);
        assert!(ok.signature().is_empty());
        let failed = Outcome::failure(Record::new("a"), Status::Fail, "", Duration::ZERO);
        assert_eq!(failed.signature(), toolsweep_signature::UNKNOWN_ERROR);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&Status::Timeout).unwrap(), "\"TIMEOUT\"");
        let s: Status = serde_json::from_str("\"CRASH\"").unwrap();
        assert_eq!(s, Status::Crash);
    }
}
