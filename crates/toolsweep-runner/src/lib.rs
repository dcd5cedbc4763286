//! Subprocess execution for toolsweep.
//!
//! Runs one external command at a time with a hard deadline. When the
//! deadline fires, the command and every process it spawned are killed, and
//! the runner waits a bounded time for the OS to reap them.

pub mod command;
pub mod runner;
pub mod tree;

pub use command::{CommandSpec, CommandTemplate, RECORD_PLACEHOLDER};
pub use runner::{
    NativeRunner, ProcessRunner, RawResult, RunLimits, RunnerError, RunnerResult,
    DEFAULT_REAP_TIMEOUT, DEFAULT_TIMEOUT,
};
