//! Per-heap operation counters.
//!
//! Counts requests, not outcomes: an operation that draws a verdict still
//! completes and is still counted. Verdict totals live in the trace sink.

/// Operation counters for one heap instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocations: u64,
    pub aligned_allocations: u64,
    pub deallocations: u64,
    pub reallocations: u64,
    /// Payload bytes requested across all allocations.
    pub bytes_requested: u64,
    /// Payload bytes copied while moving reallocations.
    pub bytes_copied: u64,
    /// Slack words poisoned on oracle advice.
    pub slack_words_poisoned: u64,
    pub restores: u64,
}

impl HeapStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: 0,
            aligned_allocations: 0,
            deallocations: 0,
            reallocations: 0,
            bytes_requested: 0,
            bytes_copied: 0,
            slack_words_poisoned: 0,
            restores: 0,
        }
    }

    /// Total operations of any kind.
    #[must_use]
    pub const fn operations(&self) -> u64 {
        self.allocations
            + self.aligned_allocations
            + self.deallocations
            + self.reallocations
            + self.restores
    }

    pub(crate) fn record_allocation(&mut self, size: u64) {
        self.allocations += 1;
        self.bytes_requested = self.bytes_requested.saturating_add(size);
    }

    pub(crate) fn record_aligned_allocation(&mut self, size: u64) {
        self.aligned_allocations += 1;
        self.bytes_requested = self.bytes_requested.saturating_add(size);
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.deallocations += 1;
    }

    pub(crate) fn record_reallocation(&mut self, copied: u64) {
        self.reallocations += 1;
        self.bytes_copied = self.bytes_copied.saturating_add(copied);
    }

    pub(crate) fn record_poisoned_slack(&mut self) {
        self.slack_words_poisoned += 1;
    }

    pub(crate) fn record_restore(&mut self) {
        self.restores += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let stats = HeapStats::new();
        assert_eq!(stats, HeapStats::default());
        assert_eq!(stats.operations(), 0);
    }

    #[test]
    fn counters_accumulate() {
        let mut stats = HeapStats::new();
        stats.record_allocation(100);
        stats.record_allocation(28);
        stats.record_aligned_allocation(64);
        stats.record_deallocation();
        stats.record_reallocation(16);
        stats.record_poisoned_slack();
        stats.record_restore();

        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.aligned_allocations, 1);
        assert_eq!(stats.bytes_requested, 192);
        assert_eq!(stats.deallocations, 1);
        assert_eq!(stats.reallocations, 1);
        assert_eq!(stats.bytes_copied, 16);
        assert_eq!(stats.slack_words_poisoned, 1);
        assert_eq!(stats.restores, 1);
        assert_eq!(stats.operations(), 6);
    }

    #[test]
    fn byte_totals_saturate() {
        let mut stats = HeapStats::new();
        stats.record_allocation(u64::MAX);
        stats.record_allocation(8);
        assert_eq!(stats.bytes_requested, u64::MAX);
    }
}
