//! Fallback linear allocator.
//!
//! Used where no oracle is available: placement is a deterministic bump of
//! the growth pointer, the requested size lives in the word just below each
//! block, and memory is never reclaimed. Trades memory for determinism so
//! the allocation paths stay testable outside a verifiable-execution
//! environment. Shares the checkpoint lifecycle with the oracle heap.

use augury_mem::{GuestMemory, WORD_SIZE};

use crate::region::align_up;
use crate::snapshot::{self, HEAP_START, HeapSnapshot};
use crate::stats::HeapStats;
use crate::trace::TraceSink;

/// Linear heap that only ever grows.
#[derive(Debug)]
pub struct BumpHeap<S> {
    pub mem: GuestMemory,
    pub sink: S,
    base: u64,
    end: Option<u64>,
    stats: HeapStats,
}

impl<S: TraceSink> BumpHeap<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self::with_base(sink, HEAP_START)
    }

    #[must_use]
    pub fn with_base(sink: S, base: u64) -> Self {
        Self {
            mem: GuestMemory::new(),
            sink,
            base,
            end: None,
            stats: HeapStats::new(),
        }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub const fn heap_end(&self) -> Option<u64> {
        self.end
    }

    #[must_use]
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Allocate `size` bytes at the natural word alignment.
    ///
    /// Returns the null sentinel when the growth pointer would overflow.
    pub fn allocate(&mut self, size: u64) -> u64 {
        self.stats.record_allocation(size);
        self.bump_impl(size, WORD_SIZE)
    }

    /// Allocate with the block base aligned to `align` (a power of two).
    ///
    /// A non-power-of-two `align` is a Bug and the natural word alignment is
    /// used instead.
    pub fn allocate_aligned(&mut self, size: u64, align: u64) -> u64 {
        self.stats.record_aligned_allocation(size);
        let align = if align.is_power_of_two() {
            align
        } else {
            self.sink.bug("alignment is not a power of two");
            WORD_SIZE
        };
        self.bump_impl(size, align)
    }

    fn bump_impl(&mut self, size: u64, align: u64) -> u64 {
        let cursor = self.end.unwrap_or(self.base);
        // One word of room below the block holds the requested size.
        let Some(block) = cursor
            .checked_add(WORD_SIZE)
            .and_then(|above| align_up(above, align))
        else {
            return 0;
        };
        let Some(block_end) = block.checked_add(size) else {
            return 0;
        };
        // The size word never becomes accessible, so clients cannot read or
        // clobber it through checked access.
        self.mem.write_word_unchecked(block - WORD_SIZE, size);
        self.mem.mark_accessible(block, block_end);
        self.end = Some(block_end);
        block
    }

    /// No-op: this mode never reclaims memory.
    pub fn deallocate(&mut self, addr: u64) {
        if addr == 0 {
            return;
        }
        self.stats.record_deallocation();
    }

    /// Copy the allocation at `addr` into a freshly bumped block of
    /// `new_size` bytes.
    pub fn reallocate(&mut self, addr: u64, new_size: u64) -> u64 {
        if addr == 0 {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            self.deallocate(addr);
            return 0;
        }

        let old_size = self.mem.read_word_unchecked(addr.wrapping_sub(WORD_SIZE));
        let new_addr = self.allocate(new_size);
        if new_addr == 0 {
            return 0;
        }
        let copy_len = old_size.min(new_size);
        if self.mem.copy_bytes(addr, new_addr, copy_len).is_err() {
            self.sink.bug("reallocated bytes could not be copied");
        }
        self.stats.record_reallocation(copy_len);
        new_addr
    }

    // ---- checkpointing -----------------------------------------------------

    /// Extent of the checkpointable heap range. Pure.
    #[must_use]
    pub fn snapshot(&self) -> HeapSnapshot {
        let len = self.end.map_or(0, |end| end.wrapping_sub(self.base));
        HeapSnapshot::new(self.base, len)
    }

    /// Raw bytes of the checkpointable range.
    #[must_use]
    pub fn snapshot_bytes(&self) -> Vec<u8> {
        snapshot::capture_bytes(&self.mem, self.snapshot())
    }

    /// Replay a checkpoint whose bytes are already in place at `addr`.
    pub fn restore(&mut self, addr: u64, len: u64) {
        self.stats.record_restore();
        snapshot::replay_extent(
            &mut self.mem,
            &mut self.sink,
            self.base,
            &mut self.end,
            addr,
            len,
        );
    }

    /// Write `bytes` at `addr` through the unchecked primitive, then replay
    /// the checkpoint.
    pub fn restore_bytes(&mut self, addr: u64, bytes: &[u8]) {
        self.mem.write_bytes_unchecked(addr, bytes);
        self.restore(addr, bytes.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::RecordingSink;

    fn bump() -> (BumpHeap<RecordingSink>, RecordingSink) {
        let sink = RecordingSink::new();
        let heap = BumpHeap::new(sink.clone());
        (heap, sink)
    }

    #[test]
    fn allocate_keeps_a_size_word_below_each_block() {
        let (mut heap, sink) = bump();
        let a = heap.allocate(16);
        assert_eq!(a, HEAP_START + 8);
        assert_eq!(heap.mem.read_word_unchecked(a - 8), 16);
        assert!(heap.mem.is_accessible(a, a + 16));
        assert!(!heap.mem.is_accessible(a - 8, a));
        assert_eq!(heap.heap_end(), Some(a + 16));

        let b = heap.allocate(8);
        assert_eq!(b, a + 16 + 8);
        assert_eq!(heap.mem.read_word_unchecked(b - 8), 8);
        assert!(sink.is_clean());
    }

    #[test]
    fn allocate_honors_requested_alignment() {
        let (mut heap, sink) = bump();
        let a = heap.allocate_aligned(8, 64);
        assert_eq!(a % 64, 0);
        assert_eq!(a, HEAP_START + 64);
        assert_eq!(heap.mem.read_word_unchecked(a - 8), 8);
        assert!(sink.is_clean());
    }

    #[test]
    fn non_power_of_two_alignment_is_a_bug() {
        let (mut heap, sink) = bump();
        let a = heap.allocate_aligned(8, 12);
        assert_eq!(sink.reasons(), vec!["alignment is not a power of two"]);
        assert_eq!(a % 8, 0);
        assert!(heap.mem.is_accessible(a, a + 8));
    }

    #[test]
    fn deallocate_never_reclaims() {
        let (mut heap, sink) = bump();
        let a = heap.allocate(8);
        heap.deallocate(a);
        assert!(heap.mem.is_accessible(a, a + 8));
        assert_eq!(heap.heap_end(), Some(a + 8));
        assert_eq!(heap.stats().deallocations, 1);
        heap.deallocate(0);
        assert_eq!(heap.stats().deallocations, 1);
        assert!(sink.is_clean());
    }

    #[test]
    fn reallocate_copies_into_a_fresh_block() {
        let (mut heap, sink) = bump();
        let a = heap.allocate(16);
        for i in 0..16u8 {
            heap.mem.write_byte(a + u64::from(i), i).unwrap();
        }
        let grown = heap.reallocate(a, 32);
        assert_ne!(grown, a);
        for i in 0..16u8 {
            assert_eq!(heap.mem.read_byte(grown + u64::from(i)).unwrap(), i);
        }
        let shrunk = heap.reallocate(grown, 4);
        for i in 0..4u8 {
            assert_eq!(heap.mem.read_byte(shrunk + u64::from(i)).unwrap(), i);
        }
        assert!(sink.is_clean(), "{:?}", sink.reasons());
        assert_eq!(heap.stats().bytes_copied, 16 + 4);
    }

    #[test]
    fn reallocate_null_and_zero_shapes() {
        let (mut heap, sink) = bump();
        let a = heap.reallocate(0, 8);
        assert_ne!(a, 0);
        assert_eq!(heap.stats().allocations, 1);
        let out = heap.reallocate(a, 0);
        assert_eq!(out, 0);
        assert_eq!(heap.stats().deallocations, 1);
        assert!(sink.is_clean());
    }

    #[test]
    fn growth_pointer_overflow_returns_null() {
        let sink = RecordingSink::new();
        let mut heap = BumpHeap::with_base(sink.clone(), u64::MAX - 24);
        assert_eq!(heap.allocate(64), 0);
        assert_eq!(heap.heap_end(), None);
        // Overflow is resource exhaustion, not a verdict.
        assert!(sink.is_clean());
    }

    #[test]
    fn snapshot_round_trips_onto_a_fresh_heap() {
        let (mut heap, sink) = bump();
        let a = heap.allocate(16);
        let b = heap.allocate(8);
        for i in 0..16u8 {
            heap.mem.write_byte(a + u64::from(i), 0xC0 + i).unwrap();
        }
        for i in 0..8u8 {
            heap.mem.write_byte(b + u64::from(i), 0x10 + i).unwrap();
        }
        assert!(sink.is_clean());

        let extent = heap.snapshot();
        let bytes = heap.snapshot_bytes();
        assert_eq!(extent.start, HEAP_START);
        assert_eq!(bytes.len(), extent.len as usize);

        let fresh_sink = RecordingSink::new();
        let mut fresh = BumpHeap::new(fresh_sink.clone());
        fresh.restore_bytes(extent.start, &bytes);
        assert!(fresh_sink.is_clean());
        assert_eq!(fresh.heap_end(), heap.heap_end());
        assert_eq!(fresh.snapshot_bytes(), bytes);

        // Growth resumes past the restored image.
        let c = fresh.allocate(8);
        assert_eq!(c, extent.end() + 8);
    }

    #[test]
    fn second_restore_is_invalid() {
        let (mut heap, sink) = bump();
        heap.restore(HEAP_START, 64);
        assert!(sink.is_clean());
        heap.restore(HEAP_START, 64);
        assert_eq!(sink.reasons(), vec!["heap has already been initialized"]);
    }

    #[test]
    fn restore_off_base_is_invalid() {
        let (mut heap, sink) = bump();
        heap.restore(HEAP_START + 16, 64);
        assert_eq!(
            sink.reasons(),
            vec!["heap snapshot was placed at the wrong location"]
        );
    }
}
