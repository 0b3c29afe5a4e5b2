//! Simulated guest memory with access tracking and word poisoning.
//!
//! [`GuestMemory`] models the byte-addressable address space the verifiable
//! execution environment gives the program: a sparse, zero-initialized 64-bit
//! space with two layers of enforcement on the checked access paths.
//!
//! - **Accessibility**: only byte ranges the environment has marked
//!   accessible may be touched. Allocators mark ranges as they hand memory
//!   out and take it back; everything else faults.
//! - **Poison**: a word that has been poisoned faults on any later checked
//!   access, and a second poisoning of the same word is rejected. Poison is
//!   never cleared.
//!
//! The `*_unchecked` methods bypass both layers. They exist for the
//! allocator's own bookkeeping (metadata words live outside the accessible
//! ranges) and for snapshot plumbing, and should not appear in ordinary
//! client code paths.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::metrics::{MemoryMetrics, global_metrics};
use crate::ranges::RangeSet;

/// Guest word size in bytes. Poison tracking and the allocator's metadata
/// layout are defined in units of this.
pub const WORD_SIZE: u64 = 8;

/// Backing-store page size in bytes.
pub const PAGE_SIZE: u64 = 4096;

const PAGE_BYTES: usize = PAGE_SIZE as usize;

/// A fault raised by a checked access or a rejected poisoning write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    /// The byte range touches an address outside every accessible span.
    Inaccessible { addr: u64 },
    /// The access lands on a poisoned word.
    Poisoned { word: u64 },
    /// A word-granular operation was given a misaligned address.
    Unaligned { addr: u64 },
}

impl fmt::Display for MemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inaccessible { addr } => {
                write!(f, "guest address {addr:#x} is outside any accessible range")
            }
            Self::Poisoned { word } => {
                write!(f, "guest word {word:#x} is poisoned")
            }
            Self::Unaligned { addr } => {
                write!(f, "guest address {addr:#x} is not word-aligned")
            }
        }
    }
}

impl std::error::Error for MemError {}

/// Address of the word containing `addr`.
#[must_use]
pub const fn containing_word(addr: u64) -> u64 {
    addr & !(WORD_SIZE - 1)
}

/// Sparse simulated guest address space.
///
/// Untouched memory reads as zero. Pages are materialized on first write.
#[derive(Debug, Clone, Default)]
pub struct GuestMemory {
    pages: HashMap<u64, Box<[u8; PAGE_BYTES]>>,
    poisoned: HashSet<u64>,
    accessible: RangeSet,
}

impl GuestMemory {
    /// Create an empty address space with nothing accessible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- accessibility ----------------------------------------------------

    /// Mark `[start, end)` legal for checked access.
    pub fn mark_accessible(&mut self, start: u64, end: u64) {
        self.accessible.insert(start, end);
    }

    /// Revoke checked access to `[start, end)`.
    pub fn mark_inaccessible(&mut self, start: u64, end: u64) {
        self.accessible.remove(start, end);
    }

    /// True if every byte of `[start, end)` is currently accessible.
    #[must_use]
    pub fn is_accessible(&self, start: u64, end: u64) -> bool {
        self.accessible.contains(start, end)
    }

    // ---- poison -----------------------------------------------------------

    /// True if the word containing `addr` is poisoned.
    #[must_use]
    pub fn is_poisoned(&self, addr: u64) -> bool {
        self.poisoned.contains(&containing_word(addr))
    }

    /// Number of poisoned words.
    #[must_use]
    pub fn poisoned_words(&self) -> usize {
        self.poisoned.len()
    }

    /// Write `val` to the word at `addr` and poison it, bypassing
    /// accessibility. The primitive enforces its own preconditions: `addr`
    /// must be word-aligned and the word must not already be poisoned.
    pub fn write_and_poison(&mut self, addr: u64, val: u64) -> Result<(), MemError> {
        if addr % WORD_SIZE != 0 {
            MemoryMetrics::inc(&global_metrics().poison_rejects);
            return Err(MemError::Unaligned { addr });
        }
        if self.poisoned.contains(&addr) {
            MemoryMetrics::inc(&global_metrics().poison_rejects);
            return Err(MemError::Poisoned { word: addr });
        }
        self.raw_write_word(addr, val);
        self.poisoned.insert(addr);
        MemoryMetrics::inc(&global_metrics().poison_marks);
        Ok(())
    }

    // ---- checked access ---------------------------------------------------

    /// Read one byte, enforcing poison and accessibility.
    pub fn read_byte(&self, addr: u64) -> Result<u8, MemError> {
        self.check_byte(addr)?;
        MemoryMetrics::inc(&global_metrics().checked_reads);
        Ok(self.raw_read(addr))
    }

    /// Write one byte, enforcing poison and accessibility.
    pub fn write_byte(&mut self, addr: u64, val: u8) -> Result<(), MemError> {
        self.check_byte(addr)?;
        MemoryMetrics::inc(&global_metrics().checked_writes);
        self.raw_write(addr, val);
        Ok(())
    }

    /// Read the word at `addr` (little-endian), enforcing alignment, poison,
    /// and accessibility.
    pub fn read_word(&self, addr: u64) -> Result<u64, MemError> {
        self.check_word(addr)?;
        MemoryMetrics::inc(&global_metrics().checked_reads);
        Ok(self.raw_read_word(addr))
    }

    /// Write the word at `addr` (little-endian), enforcing alignment, poison,
    /// and accessibility.
    pub fn write_word(&mut self, addr: u64, val: u64) -> Result<(), MemError> {
        self.check_word(addr)?;
        MemoryMetrics::inc(&global_metrics().checked_writes);
        self.raw_write_word(addr, val);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst` through the checked paths,
    /// stopping at the first fault.
    pub fn copy_bytes(&mut self, src: u64, dst: u64, len: u64) -> Result<(), MemError> {
        for i in 0..len {
            let b = self.read_byte(src.wrapping_add(i))?;
            self.write_byte(dst.wrapping_add(i), b)?;
        }
        MemoryMetrics::add(&global_metrics().bytes_copied, len);
        Ok(())
    }

    // ---- unchecked access -------------------------------------------------

    /// Read one byte, bypassing all checks.
    #[must_use]
    pub fn read_byte_unchecked(&self, addr: u64) -> u8 {
        MemoryMetrics::inc(&global_metrics().unchecked_reads);
        self.raw_read(addr)
    }

    /// Write one byte, bypassing all checks.
    pub fn write_byte_unchecked(&mut self, addr: u64, val: u8) {
        MemoryMetrics::inc(&global_metrics().unchecked_writes);
        self.raw_write(addr, val);
    }

    /// Read the word starting at `addr` (little-endian, any alignment),
    /// bypassing all checks.
    #[must_use]
    pub fn read_word_unchecked(&self, addr: u64) -> u64 {
        MemoryMetrics::inc(&global_metrics().unchecked_reads);
        self.raw_read_word(addr)
    }

    /// Write the word starting at `addr` (little-endian, any alignment),
    /// bypassing all checks.
    pub fn write_word_unchecked(&mut self, addr: u64, val: u64) {
        MemoryMetrics::inc(&global_metrics().unchecked_writes);
        self.raw_write_word(addr, val);
    }

    /// Read `len` bytes starting at `start`, bypassing all checks.
    #[must_use]
    pub fn read_bytes_unchecked(&self, start: u64, len: u64) -> Vec<u8> {
        MemoryMetrics::inc(&global_metrics().unchecked_reads);
        (0..len)
            .map(|i| self.raw_read(start.wrapping_add(i)))
            .collect()
    }

    /// Write `bytes` starting at `start`, bypassing all checks.
    pub fn write_bytes_unchecked(&mut self, start: u64, bytes: &[u8]) {
        MemoryMetrics::inc(&global_metrics().unchecked_writes);
        for (i, &b) in bytes.iter().enumerate() {
            self.raw_write(start.wrapping_add(i as u64), b);
        }
    }

    // ---- internals --------------------------------------------------------

    fn check_byte(&self, addr: u64) -> Result<(), MemError> {
        if self.poisoned.contains(&containing_word(addr)) {
            MemoryMetrics::inc(&global_metrics().poison_faults);
            return Err(MemError::Poisoned {
                word: containing_word(addr),
            });
        }
        if !self.accessible.contains_addr(addr) {
            MemoryMetrics::inc(&global_metrics().access_faults);
            return Err(MemError::Inaccessible { addr });
        }
        Ok(())
    }

    fn check_word(&self, addr: u64) -> Result<(), MemError> {
        if addr % WORD_SIZE != 0 {
            return Err(MemError::Unaligned { addr });
        }
        if self.poisoned.contains(&addr) {
            MemoryMetrics::inc(&global_metrics().poison_faults);
            return Err(MemError::Poisoned { word: addr });
        }
        if !self.accessible.contains(addr, addr.wrapping_add(WORD_SIZE)) {
            MemoryMetrics::inc(&global_metrics().access_faults);
            return Err(MemError::Inaccessible { addr });
        }
        Ok(())
    }

    fn raw_read(&self, addr: u64) -> u8 {
        let page = addr / PAGE_SIZE;
        let offset = (addr % PAGE_SIZE) as usize;
        self.pages.get(&page).map_or(0, |p| p[offset])
    }

    fn raw_write(&mut self, addr: u64, val: u8) {
        let page = addr / PAGE_SIZE;
        let offset = (addr % PAGE_SIZE) as usize;
        let slab = self
            .pages
            .entry(page)
            .or_insert_with(|| Box::new([0u8; PAGE_BYTES]));
        slab[offset] = val;
    }

    fn raw_read_word(&self, addr: u64) -> u64 {
        let mut bytes = [0u8; WORD_SIZE as usize];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.raw_read(addr.wrapping_add(i as u64));
        }
        u64::from_le_bytes(bytes)
    }

    fn raw_write_word(&mut self, addr: u64, val: u64) {
        for (i, b) in val.to_le_bytes().iter().enumerate() {
            self.raw_write(addr.wrapping_add(i as u64), *b);
        }
    }
}
