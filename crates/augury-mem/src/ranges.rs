//! Disjoint half-open interval bookkeeping over the guest address space.
//!
//! Backs the accessibility tracking in [`crate::memory::GuestMemory`]: the
//! execution environment marks byte ranges accessible when they are handed to
//! the program and inaccessible when they are taken back, and every checked
//! access consults this set. Spans are kept disjoint and merged with their
//! neighbors, so membership is a single predecessor lookup.

use std::collections::BTreeMap;

/// A set of disjoint, half-open `[start, end)` byte ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    /// Map from span start to span end. Invariant: spans are non-empty,
    /// pairwise disjoint, and never adjacent (touching spans are merged).
    spans: BTreeMap<u64, u64>,
}

impl RangeSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spans: BTreeMap::new(),
        }
    }

    /// True if no byte is in the set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of maximal spans currently stored.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Add `[start, end)` to the set. Empty ranges are ignored. Overlapping
    /// and adjacent spans are coalesced into one.
    pub fn insert(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }
        let mut new_start = start;
        let mut new_end = end;
        if let Some((&s, &e)) = self.spans.range(..=start).next_back() {
            if e >= start {
                new_start = s;
                new_end = new_end.max(e);
            }
        }
        let absorbed: Vec<u64> = self
            .spans
            .range(new_start..=new_end)
            .map(|(&s, _)| s)
            .collect();
        for s in absorbed {
            if let Some(e) = self.spans.remove(&s) {
                new_end = new_end.max(e);
            }
        }
        self.spans.insert(new_start, new_end);
    }

    /// Remove `[start, end)` from the set, splitting spans that straddle a
    /// boundary. Empty ranges are ignored.
    pub fn remove(&mut self, start: u64, end: u64) {
        if start >= end {
            return;
        }
        if let Some((&s, &e)) = self.spans.range(..start).next_back() {
            if e > start {
                self.spans.insert(s, start);
                if e > end {
                    // The removal zone is interior to one span.
                    self.spans.insert(end, e);
                    return;
                }
            }
        }
        let affected: Vec<(u64, u64)> = self
            .spans
            .range(start..end)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in affected {
            self.spans.remove(&s);
            if e > end {
                self.spans.insert(end, e);
            }
        }
    }

    /// True if every byte of `[start, end)` is in the set. Empty ranges are
    /// trivially contained.
    #[must_use]
    pub fn contains(&self, start: u64, end: u64) -> bool {
        if start >= end {
            return true;
        }
        match self.spans.range(..=start).next_back() {
            Some((_, &e)) => e >= end,
            None => false,
        }
    }

    /// True if the single byte at `addr` is in the set.
    #[must_use]
    pub fn contains_addr(&self, addr: u64) -> bool {
        match self.spans.range(..=addr).next_back() {
            Some((_, &e)) => e > addr,
            None => false,
        }
    }

    /// Iterate the maximal spans in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.spans.iter().map(|(&s, &e)| (s, e))
    }
}
