//! Region geometry: power-of-two sizing encoded in high address bits.
//!
//! Every heap region is a self-aligned `2^k` span whose class `k` is carried
//! in the address itself rather than in a side table. The oracle hands back
//! plain `u64` guest addresses, so decoding is a shift and a mask, and the
//! allocator re-derives everything else (metadata placement, usable span,
//! slack range) from the address alone.
//!
//! Layout of a class-`k` region at `base` (`base % 2^k == 0`):
//!
//! ```text
//! base                    base+size          metadata_base    base+2^k
//! |  usable bytes         |  slack           |  metadata      |
//! |  [base, base+size)    |  poison advice   |  1 or 2 words  |
//! ```

use augury_mem::WORD_SIZE;

// ---- address encoding -----------------------------------------------------

/// Bit position where the region class starts.
pub const REGION_CLASS_SHIFT: u32 = 58;

/// Mask applied to the shifted address to recover the class.
pub const REGION_CLASS_MASK: u64 = 0x3f;

/// Value stored in the marker metadata word of a live region.
pub const ALLOCATED_MARKER: u64 = 1;

/// Metadata footprint at the high end of each region.
///
/// The marker word is the double-allocation defense; the recorded-size word
/// is what makes reallocation possible. Both are written through the
/// write-and-poison primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MetadataMode {
    /// One word: the allocated marker. Matches the minimal layout; regions
    /// carry no size record, so reallocation is unsupported.
    Marker,
    /// Two words: the allocated marker plus the requested size directly
    /// below it.
    #[default]
    MarkerAndSize,
}

impl MetadataMode {
    /// Number of metadata words.
    #[must_use]
    pub const fn words(self) -> u64 {
        match self {
            Self::Marker => 1,
            Self::MarkerAndSize => 2,
        }
    }

    /// Metadata footprint in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.words() * WORD_SIZE
    }

    /// True if regions record their requested size.
    #[must_use]
    pub const fn records_size(self) -> bool {
        matches!(self, Self::MarkerAndSize)
    }
}

// ---- decoding -------------------------------------------------------------

/// Region class `k` carried in the high bits of `addr`.
#[must_use]
pub const fn region_class(addr: u64) -> u32 {
    ((addr >> REGION_CLASS_SHIFT) & REGION_CLASS_MASK) as u32
}

/// Region size `2^k` decoded from `addr`.
#[must_use]
pub const fn region_size(addr: u64) -> u64 {
    1u64 << region_class(addr)
}

/// True if `addr` is aligned to its own decoded region size.
#[must_use]
pub const fn is_region_start(addr: u64) -> bool {
    addr % region_size(addr) == 0
}

/// One past the last byte of the region starting at `addr`. Wraps for
/// addresses that were never valid region starts.
#[must_use]
pub const fn region_end(addr: u64) -> u64 {
    addr.wrapping_add(region_size(addr))
}

/// Address of the marker metadata word of the region at `addr`.
#[must_use]
pub const fn marker_addr(addr: u64) -> u64 {
    region_end(addr).wrapping_sub(WORD_SIZE)
}

/// Lowest metadata address of the region at `addr`; the slack available for
/// poison advice ends here.
#[must_use]
pub const fn metadata_base(addr: u64, mode: MetadataMode) -> u64 {
    region_end(addr).wrapping_sub(mode.bytes())
}

/// Bytes of the region at `addr` available to the caller.
#[must_use]
pub const fn usable_size(addr: u64, mode: MetadataMode) -> u64 {
    region_size(addr).saturating_sub(mode.bytes())
}

// ---- encoding -------------------------------------------------------------

/// Smallest class whose regions can hold `size` payload bytes plus metadata.
/// `None` when no class is large enough.
#[must_use]
pub fn min_class_for(size: u64, mode: MetadataMode) -> Option<u32> {
    let need = size.checked_add(mode.bytes())?;
    Some(need.checked_next_power_of_two()?.trailing_zeros())
}

/// Base address of the `slot`-th class-`class` region.
///
/// The offset must stay below the class bit-field; callers (the frontier
/// oracle and tests) keep `slot << class < 2^58`.
#[must_use]
pub fn class_base(class: u32, slot: u64) -> u64 {
    debug_assert!(class <= REGION_CLASS_MASK as u32);
    let offset = slot << class;
    debug_assert!(offset < 1u64 << REGION_CLASS_SHIFT);
    (u64::from(class) << REGION_CLASS_SHIFT) | offset
}

/// Round `value` up to a multiple of `align` (a power of two). `None` on
/// overflow or a non-power-of-two alignment.
#[must_use]
pub fn align_up(value: u64, align: u64) -> Option<u64> {
    if !align.is_power_of_two() {
        return None;
    }
    Some(value.checked_add(align - 1)? & !(align - 1))
}
