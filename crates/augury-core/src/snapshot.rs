//! Heap checkpointing.
//!
//! A snapshot is a flat byte range with no header: the extent travels
//! out-of-band as a [`HeapSnapshot`] and the contents as plain bytes.
//! Restoring replays a checkpoint into an uninitialized heap so a recorded
//! execution can resume from it. The restore bookkeeping assumes the bytes
//! are already in place at the heap base; the byte-carrying restore variants
//! on the heaps write them there first.

use augury_mem::GuestMemory;

use crate::trace::{TraceSink, valid_if};

/// Base address of the linear heap range. Snapshots are anchored here.
pub const HEAP_START: u64 = 0x10_0000;

/// Extent of a heap checkpoint: the byte range `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapSnapshot {
    pub start: u64,
    pub len: u64,
}

impl HeapSnapshot {
    #[must_use]
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// One past the last byte covered.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.start.wrapping_add(self.len)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// Raw bytes of the checkpointed range.
pub(crate) fn capture_bytes(mem: &GuestMemory, snap: HeapSnapshot) -> Vec<u8> {
    mem.read_bytes_unchecked(snap.start, snap.len)
}

/// Replay the bookkeeping of a checkpoint placed at `addr`: mark the range
/// accessible and initialize the heap end.
///
/// The placement must match `anchor` and the heap must still be
/// uninitialized; either violation reports Invalid. The effects apply
/// regardless, the reporting layer above decides whether the trace survives.
pub(crate) fn replay_extent<S: TraceSink + ?Sized>(
    mem: &mut GuestMemory,
    sink: &mut S,
    anchor: u64,
    end: &mut Option<u64>,
    addr: u64,
    len: u64,
) {
    valid_if(
        sink,
        addr == anchor,
        "heap snapshot was placed at the wrong location",
    );
    valid_if(sink, end.is_none(), "heap has already been initialized");
    let new_end = addr.wrapping_add(len);
    mem.mark_accessible(addr, new_end);
    *end = Some(new_end);
}
