//! Atomic counters for guest memory traffic.
//!
//! All counters use relaxed ordering; they are advisory counts, not
//! synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global substrate operation counters.
pub struct MemoryMetrics {
    /// Checked byte/word reads that passed enforcement.
    pub checked_reads: AtomicU64,
    /// Checked byte/word writes that passed enforcement.
    pub checked_writes: AtomicU64,
    /// Reads through the unchecked primitives.
    pub unchecked_reads: AtomicU64,
    /// Writes through the unchecked primitives.
    pub unchecked_writes: AtomicU64,
    /// Words successfully written-and-poisoned.
    pub poison_marks: AtomicU64,
    /// Rejected write-and-poison attempts (misaligned or already poisoned).
    pub poison_rejects: AtomicU64,
    /// Checked accesses that faulted on a poisoned word.
    pub poison_faults: AtomicU64,
    /// Checked accesses that faulted outside the accessible ranges.
    pub access_faults: AtomicU64,
    /// Bytes moved by successful checked copies.
    pub bytes_copied: AtomicU64,
}

impl MemoryMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            checked_reads: AtomicU64::new(0),
            checked_writes: AtomicU64::new(0),
            unchecked_reads: AtomicU64::new(0),
            unchecked_writes: AtomicU64::new(0),
            poison_marks: AtomicU64::new(0),
            poison_rejects: AtomicU64::new(0),
            poison_faults: AtomicU64::new(0),
            access_faults: AtomicU64::new(0),
            bytes_copied: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment a counter by `n`.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot all counters into a displayable summary.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checked_reads: Self::get(&self.checked_reads),
            checked_writes: Self::get(&self.checked_writes),
            unchecked_reads: Self::get(&self.unchecked_reads),
            unchecked_writes: Self::get(&self.unchecked_writes),
            poison_marks: Self::get(&self.poison_marks),
            poison_rejects: Self::get(&self.poison_rejects),
            poison_faults: Self::get(&self.poison_faults),
            access_faults: Self::get(&self.access_faults),
            bytes_copied: Self::get(&self.bytes_copied),
        }
    }
}

impl Default for MemoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all substrate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub checked_reads: u64,
    pub checked_writes: u64,
    pub unchecked_reads: u64,
    pub unchecked_writes: u64,
    pub poison_marks: u64,
    pub poison_rejects: u64,
    pub poison_faults: u64,
    pub access_faults: u64,
    pub bytes_copied: u64,
}

/// Global metrics instance.
static GLOBAL_METRICS: MemoryMetrics = MemoryMetrics::new();

/// Access the global metrics singleton.
#[must_use]
pub fn global_metrics() -> &'static MemoryMetrics {
    &GLOBAL_METRICS
}
