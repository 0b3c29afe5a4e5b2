//! Two-outcome validity reporting.
//!
//! Every invariant failure in the heap resolves to one of two verdicts:
//!
//! - [`Verdict::Invalid`]: an oracle-supplied value broke a soundness
//!   invariant. The surrounding execution trace cannot be trusted; a layer
//!   above is expected to halt or discard it.
//! - [`Verdict::Bug`]: the client misused the heap. Reported, and the
//!   operation completes best-effort.
//!
//! Reporting is side-effecting only. The heap keeps executing
//! deterministically after either verdict, so sinks must not unwind.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config;

/// The two ways a heap invariant can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The execution trace is unsound.
    Invalid,
    /// The program under test misused the heap.
    Bug,
}

impl Verdict {
    /// True for verdicts that condemn the whole trace.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Invalid)
    }

    /// Uppercase tag used in diagnostics.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Bug => "BUG",
        }
    }
}

/// One reported invariant failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceReport {
    pub verdict: Verdict,
    pub reason: &'static str,
}

/// Receiver for validity verdicts, injected into every heap.
pub trait TraceSink {
    /// Record one verdict. Must return normally.
    fn report(&mut self, report: TraceReport);

    /// Report that the trace is unsound.
    fn invalid(&mut self, reason: &'static str) {
        self.report(TraceReport {
            verdict: Verdict::Invalid,
            reason,
        });
    }

    /// Report client misuse.
    fn bug(&mut self, reason: &'static str) {
        self.report(TraceReport {
            verdict: Verdict::Bug,
            reason,
        });
    }
}

/// Report Invalid unless `cond` holds.
pub fn valid_if<S: TraceSink + ?Sized>(sink: &mut S, cond: bool, reason: &'static str) {
    if !cond {
        sink.invalid(reason);
    }
}

/// Report Bug if `cond` holds.
pub fn bug_if<S: TraceSink + ?Sized>(sink: &mut S, cond: bool, reason: &'static str) {
    if cond {
        sink.bug(reason);
    }
}

/// Sink that captures every report in a shared buffer.
///
/// Clones share one buffer, so a test can keep a handle while the heap owns
/// another and inspect verdicts without taking the heap apart.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<TraceReport>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far.
    #[must_use]
    pub fn reports(&self) -> Vec<TraceReport> {
        self.reports.lock().clone()
    }

    /// Reasons reported so far, in order.
    #[must_use]
    pub fn reasons(&self) -> Vec<&'static str> {
        self.reports.lock().iter().map(|r| r.reason).collect()
    }

    /// Number of Invalid verdicts.
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.count_of(Verdict::Invalid)
    }

    /// Number of Bug verdicts.
    #[must_use]
    pub fn bug_count(&self) -> usize {
        self.count_of(Verdict::Bug)
    }

    /// True if nothing has been reported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Drop all recorded reports.
    pub fn clear(&self) {
        self.reports.lock().clear();
    }

    fn count_of(&self, verdict: Verdict) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.verdict == verdict)
            .count()
    }
}

impl TraceSink for RecordingSink {
    fn report(&mut self, report: TraceReport) {
        self.reports.lock().push(report);
    }
}

/// Sink that prints verdicts to stderr.
///
/// Reasons are included only when the debug switch is on, mirroring the
/// interpreter's message gating; the verdict tag always prints.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl TraceSink for StderrSink {
    fn report(&mut self, report: TraceReport) {
        if config::debug_enabled() {
            eprintln!("[augury] {}: {}", report.verdict.tag(), report.reason);
        } else {
            eprintln!("[augury] {}", report.verdict.tag());
        }
    }
}
