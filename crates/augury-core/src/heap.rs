//! Oracle-driven region heap.
//!
//! Placement comes from an untrusted [`AllocationOracle`]; every answer is
//! validated against the region encoding before the heap acts on it.
//! Failures report through the injected [`TraceSink`] and control falls
//! through deterministically: an Invalid verdict condemns the trace at a
//! layer above, it does not change local control flow.
//!
//! Life of an allocation:
//! 1. the oracle proposes a base address for the requested size,
//! 2. the decoded region must fit the payload plus metadata and the base
//!    must be region-aligned,
//! 3. the metadata words are written and poisoned (a poisoned metadata word
//!    means the oracle issued the region twice),
//! 4. the payload range becomes accessible,
//! 5. the oracle may nominate one slack word to poison.
//!
//! Freed regions are released back to the oracle but their poison is never
//! cleared, so no region can be soundly issued a second time.

use augury_mem::{GuestMemory, MemError, WORD_SIZE};

use crate::oracle::AllocationOracle;
use crate::region::{
    ALLOCATED_MARKER, MetadataMode, marker_addr, metadata_base, region_end, region_size,
    usable_size,
};
use crate::snapshot::{self, HEAP_START, HeapSnapshot};
use crate::stats::HeapStats;
use crate::trace::{TraceSink, bug_if, valid_if};

/// Region heap that validates an untrusted oracle's placement choices.
#[derive(Debug)]
pub struct OracleHeap<O, S> {
    pub mem: GuestMemory,
    pub oracle: O,
    pub sink: S,
    mode: MetadataMode,
    heap_end: Option<u64>,
    stats: HeapStats,
}

impl<O: AllocationOracle, S: TraceSink> OracleHeap<O, S> {
    /// Heap recording both metadata words per region.
    #[must_use]
    pub fn new(oracle: O, sink: S) -> Self {
        Self::with_mode(oracle, sink, MetadataMode::default())
    }

    #[must_use]
    pub fn with_mode(oracle: O, sink: S, mode: MetadataMode) -> Self {
        Self {
            mem: GuestMemory::new(),
            oracle,
            sink,
            mode,
            heap_end: None,
            stats: HeapStats::new(),
        }
    }

    #[must_use]
    pub const fn metadata_mode(&self) -> MetadataMode {
        self.mode
    }

    #[must_use]
    pub const fn heap_end(&self) -> Option<u64> {
        self.heap_end
    }

    #[must_use]
    pub const fn stats(&self) -> HeapStats {
        self.stats
    }

    // ---- allocation --------------------------------------------------------

    /// Allocate `size` payload bytes at an oracle-chosen region base.
    ///
    /// On a clean return the bytes `[addr, addr + size)` are accessible and
    /// exclusively owned by the caller until freed.
    pub fn allocate(&mut self, size: u64) -> u64 {
        self.stats.record_allocation(size);
        self.alloc_impl(size)
    }

    /// Allocate with the base aligned to `align` (a power of two).
    ///
    /// Regions are naturally aligned to their power-of-two size, so raising
    /// the effective request to `max(size, align)` guarantees the base
    /// alignment. A non-power-of-two `align` is a Bug and the size is used
    /// unraised.
    pub fn allocate_aligned(&mut self, size: u64, align: u64) -> u64 {
        self.stats.record_aligned_allocation(size);
        let effective = if align.is_power_of_two() {
            size.max(align)
        } else {
            self.sink.bug("alignment is not a power of two");
            size
        };
        self.alloc_impl(effective)
    }

    fn alloc_impl(&mut self, size: u64) -> u64 {
        // The first allocation pins the heap lifecycle; a restore afterwards
        // reports Invalid.
        if self.heap_end.is_none() {
            self.heap_end = Some(HEAP_START);
        }

        let addr = self.oracle.propose_alloc(size);

        // The region must fit the payload plus metadata, and the base must
        // sit on a region-size boundary. An overflowing sum can never fit.
        let rsize = region_size(addr);
        let fits = size
            .checked_add(self.mode.bytes())
            .is_some_and(|need| rsize >= need);
        valid_if(&mut self.sink, fits, "allocated region size is too small");
        valid_if(
            &mut self.sink,
            addr % rsize == 0,
            "allocated address is misaligned for its region size",
        );

        // Mark the region live. Poison on the metadata words is what makes a
        // re-issued region detectable.
        self.write_metadata(marker_addr(addr), ALLOCATED_MARKER);
        if self.mode.records_size() {
            self.write_metadata(metadata_base(addr, self.mode), size);
        }
        self.mem.mark_accessible(addr, addr.wrapping_add(size));

        self.advise_and_poison(
            addr.wrapping_add(size),
            metadata_base(addr, self.mode),
            "poisoned word overlaps usable allocation",
        );
        addr
    }

    fn write_metadata(&mut self, addr: u64, val: u64) {
        match self.mem.write_and_poison(addr, val) {
            Ok(()) => {}
            Err(MemError::Poisoned { .. }) => {
                self.sink.invalid("allocation metadata word is already poisoned");
            }
            Err(_) => {
                self.sink.invalid("allocation metadata word is not word-aligned");
            }
        }
    }

    /// Let the oracle nominate one slack word in `[start, meta)` to poison.
    fn advise_and_poison(&mut self, start: u64, meta: u64, low_reason: &'static str) {
        let Some(word) = self.oracle.propose_poison(start, meta) else {
            return;
        };
        let aligned = word % WORD_SIZE == 0;
        let above_start = start <= word;
        let below_meta = word < meta;
        valid_if(&mut self.sink, aligned, "poison address is not word-aligned");
        valid_if(&mut self.sink, above_start, low_reason);
        valid_if(
            &mut self.sink,
            below_meta,
            "poisoned word overlaps allocation metadata",
        );
        if aligned && above_start && below_meta {
            match self.mem.write_and_poison(word, 0) {
                Ok(()) => self.stats.record_poisoned_slack(),
                Err(_) => self.sink.invalid("advised poison word is already poisoned"),
            }
        }
    }

    // ---- deallocation ------------------------------------------------------

    /// Free the region starting at `addr`. No-op on the null sentinel.
    pub fn deallocate(&mut self, addr: u64) {
        if addr == 0 {
            return;
        }
        self.stats.record_deallocation();

        let rsize = region_size(addr);
        bug_if(
            &mut self.sink,
            addr % rsize != 0,
            "freed pointer not the start of a region",
        );

        // The write turns double-free and free-before-alloc into an access
        // fault while the range is still tracked; after the release the
        // evidence would be gone.
        if self.mem.write_byte(addr, 0).is_err() {
            self.sink.bug("freed pointer does not point to accessible memory");
        }

        self.oracle.release(addr);
        self.mem.mark_inaccessible(addr, region_end(addr));

        self.advise_and_poison(
            addr,
            metadata_base(addr, self.mode),
            "poisoned word is before the freed region",
        );
    }

    // ---- reallocation ------------------------------------------------------

    /// Move the allocation at `addr` to a fresh region of `new_size` bytes.
    ///
    /// A null `addr` allocates; a zero `new_size` frees and returns the null
    /// sentinel. The retained prefix is `min(old, new)` bytes.
    pub fn reallocate(&mut self, addr: u64, new_size: u64) -> u64 {
        if addr == 0 {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            self.deallocate(addr);
            return 0;
        }

        // The recorded size is poisoned against tampering, so it is read
        // through the unchecked primitive. Clamping to the region capacity
        // bounds the copy even if the metadata never existed.
        let capacity = usable_size(addr, self.mode);
        let old_size = if self.mode.records_size() {
            self.mem
                .read_word_unchecked(metadata_base(addr, self.mode))
                .min(capacity)
        } else {
            self.sink.bug("reallocated region does not record its size");
            capacity
        };

        let new_addr = self.allocate(new_size);
        let copy_len = old_size.min(new_size);
        if self.mem.copy_bytes(addr, new_addr, copy_len).is_err() {
            self.sink.bug("reallocated bytes could not be copied");
        }
        self.deallocate(addr);
        self.stats.record_reallocation(copy_len);
        new_addr
    }

    // ---- checkpointing -----------------------------------------------------

    /// Extent of the checkpointable heap range. Pure.
    #[must_use]
    pub fn snapshot(&self) -> HeapSnapshot {
        let len = self.heap_end.map_or(0, |end| end.wrapping_sub(HEAP_START));
        HeapSnapshot::new(HEAP_START, len)
    }

    /// Raw bytes of the checkpointable range.
    #[must_use]
    pub fn snapshot_bytes(&self) -> Vec<u8> {
        snapshot::capture_bytes(&self.mem, self.snapshot())
    }

    /// Replay a checkpoint whose bytes are already in place at `addr`.
    ///
    /// Must run before any allocation in the session; the placement must be
    /// the heap base. Violations report Invalid.
    pub fn restore(&mut self, addr: u64, len: u64) {
        self.stats.record_restore();
        snapshot::replay_extent(
            &mut self.mem,
            &mut self.sink,
            HEAP_START,
            &mut self.heap_end,
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
