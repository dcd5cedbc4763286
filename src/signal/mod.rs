//! Interrupt handling (SIGINT/SIGTERM)
//!
//! The first interrupt lets the record in flight finish; the driver then
//! stops and the summary for the processed prefix is still printed. A second
//! interrupt exits at once with [`EXIT_CODE_INTERRUPTED`]. Failure log blocks
//! are flushed as they are written, so the log stays intact either way.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for interrupted runs
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Stop flag shared between the handler and the driver
#[derive(Debug, Default)]
pub struct SignalState {
    stop_requested: AtomicBool,
    /// Interrupts seen, saturating
    received: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Ask the driver to stop after the current record
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Record one interrupt and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let previous = self
            .received
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
            .unwrap_or(u8::MAX);

        match previous {
            0 => {
                self.request_stop();
                SignalAction::StopAfterCurrent
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: finish the current record, then stop
    StopAfterCurrent,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Anything later (the process is already exiting)
    Ignore,
}

/// Installs the process-wide interrupt handler
#[derive(Default)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// State to hand to the driver
    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler. Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::StopAfterCurrent => {
                eprintln!(
                    "\nInterrupt received, stopping after the current record \
                     (press again to exit now)..."
                );
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(EXIT_CODE_INTERRUPTED);
            }
            SignalAction::Ignore => {}
        })
    }
}
