//! Address choosers.
//!
//! An [`AllocationOracle`] picks region base addresses and slack words to
//! poison. Its answers are advisory and untrusted: the heap re-validates
//! every address against the region encoding before acting on it, so a
//! hostile implementation can at worst produce an Invalid verdict, never a
//! corrupted heap.
//!
//! Two implementations ship with the crate:
//! - [`FrontierOracle`]: an honest chooser that hands out fresh, never
//!   reused regions. Drives the happy paths in tests and fuzzing.
//! - [`ScriptedOracle`]: replays a fixed answer script, letting tests steer
//!   the heap into every validation failure.

use std::collections::{HashMap, HashSet, VecDeque};

use augury_mem::WORD_SIZE;

use crate::region::{MetadataMode, REGION_CLASS_SHIFT, align_up, class_base, min_class_for};

/// Chooses addresses for the heap. All answers are untrusted.
pub trait AllocationOracle {
    /// Choose a base address for an allocation of `size` payload bytes.
    ///
    /// An honest answer is the start of a free region large enough for the
    /// payload plus metadata. Any u64 is accepted here; the heap decides
    /// whether it passes validation.
    fn propose_alloc(&mut self, size: u64) -> u64;

    /// Optionally nominate one word in `[start, end)` to poison.
    ///
    /// An honest answer `w` satisfies `start <= w`, `w + 8 <= end` and
    /// `w % 8 == 0`, or is `None` to decline.
    fn propose_poison(&mut self, start: u64, end: u64) -> Option<u64>;

    /// Notification that the region at `addr` was freed.
    ///
    /// Purely informational. Freed regions stay poisoned, so reusing one is
    /// never honest.
    fn release(&mut self, addr: u64);
}

impl<O: AllocationOracle + ?Sized> AllocationOracle for Box<O> {
    fn propose_alloc(&mut self, size: u64) -> u64 {
        (**self).propose_alloc(size)
    }

    fn propose_poison(&mut self, start: u64, end: u64) -> Option<u64> {
        (**self).propose_poison(start, end)
    }

    fn release(&mut self, addr: u64) {
        (**self).release(addr);
    }
}

/// How an honest oracle answers poison requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PoisonPolicy {
    /// Poison the first word-aligned word of the slack range.
    #[default]
    FirstWord,
    /// Always decline.
    Decline,
}

// ---- frontier oracle -------------------------------------------------------

/// Honest chooser that allocates along a per-class frontier.
///
/// Each size class hands out slots in increasing order starting at slot 1,
/// so every answer is a fresh region base and no address is ever offered
/// twice. Released regions are recorded but never recycled. Poison advice
/// is tracked the same way: a word is nominated at most once, since poison
/// is permanent and a repeated nomination would fail.
#[derive(Debug, Default)]
pub struct FrontierOracle {
    mode: MetadataMode,
    policy: PoisonPolicy,
    next_slot: HashMap<u32, u64>,
    advised: HashSet<u64>,
    /// Base addresses the heap has released, in order.
    pub released: Vec<u64>,
}

impl FrontierOracle {
    /// Frontier oracle that advises poisoning the first slack word.
    #[must_use]
    pub fn new(mode: MetadataMode) -> Self {
        Self {
            mode,
            policy: PoisonPolicy::FirstWord,
            next_slot: HashMap::new(),
            advised: HashSet::new(),
            released: Vec::new(),
        }
    }

    /// Frontier oracle that declines every poison request.
    #[must_use]
    pub fn declining(mode: MetadataMode) -> Self {
        Self {
            policy: PoisonPolicy::Decline,
            ..Self::new(mode)
        }
    }

    fn next_base(&mut self, class: u32) -> Option<u64> {
        if class >= REGION_CLASS_SHIFT {
            return None;
        }
        let slot = self.next_slot.entry(class).or_insert(1);
        // The slot offset must stay below the class bit-field.
        if *slot >= 1u64 << (REGION_CLASS_SHIFT - class) {
            return None;
        }
        let base = class_base(class, *slot);
        *slot += 1;
        Some(base)
    }
}

impl AllocationOracle for FrontierOracle {
    fn propose_alloc(&mut self, size: u64) -> u64 {
        min_class_for(size, self.mode)
            .and_then(|class| self.next_base(class))
            .unwrap_or(0)
    }

    fn propose_poison(&mut self, start: u64, end: u64) -> Option<u64> {
        match self.policy {
            PoisonPolicy::Decline => None,
            PoisonPolicy::FirstWord => {
                let word = align_up(start, WORD_SIZE)?;
                if word.checked_add(WORD_SIZE)? <= end && self.advised.insert(word) {
                    Some(word)
                } else {
                    None
                }
            }
        }
    }

    fn release(&mut self, addr: u64) {
        self.released.push(addr);
    }
}

// ---- scripted oracle -------------------------------------------------------

/// Replays a fixed answer script. Test support.
///
/// An exhausted allocation script answers 0 and an exhausted poison script
/// declines; address 0 never passes region validation, so running off the
/// end of a script surfaces as an Invalid verdict rather than a panic.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    allocs: VecDeque<u64>,
    poisons: VecDeque<Option<u64>>,
    /// Base addresses the heap has released, in order.
    pub released: Vec<u64>,
}

impl ScriptedOracle {
    /// Script the allocation answers; every poison request is declined.
    #[must_use]
    pub fn new<A>(allocs: A) -> Self
    where
        A: IntoIterator<Item = u64>,
    {
        Self {
            allocs: allocs.into_iter().collect(),
            poisons: VecDeque::new(),
            released: Vec::new(),
        }
    }

    /// Script both the allocation and the poison answers.
    #[must_use]
    pub fn with_poisons<A, P>(allocs: A, poisons: P) -> Self
    where
        A: IntoIterator<Item = u64>,
        P: IntoIterator<Item = Option<u64>>,
    {
        Self {
            poisons: poisons.into_iter().collect(),
            ..Self::new(allocs)
        }
    }

    /// Answers not yet consumed.
    #[must_use]
    pub fn remaining_allocs(&self) -> usize {
        self.allocs.len()
    }
}

impl AllocationOracle for ScriptedOracle {
    fn propose_alloc(&mut self, _size: u64) -> u64 {
        self.allocs.pop_front().unwrap_or(0)
    }

    fn propose_poison(&mut self, _start: u64, _end: u64) -> Option<u64> {
        self.poisons.pop_front().flatten()
    }

    fn release(&mut self, addr: u64) {
        self.released.push(addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{is_region_start, region_class, region_size};

    #[test]
    fn frontier_answers_are_valid_region_starts() {
        let mut oracle = FrontierOracle::new(MetadataMode::MarkerAndSize);
        for size in [1, 8, 16, 100, 4096] {
            let addr = oracle.propose_alloc(size);
            assert!(is_region_start(addr), "size {size} gave {addr:#x}");
            assert!(region_size(addr) >= size + MetadataMode::MarkerAndSize.bytes());
        }
    }

    #[test]
    fn frontier_picks_the_minimal_class() {
        let mut marker = FrontierOracle::new(MetadataMode::Marker);
        assert_eq!(region_class(marker.propose_alloc(8)), 4);
        assert_eq!(region_class(marker.propose_alloc(9)), 5);

        let mut full = FrontierOracle::new(MetadataMode::MarkerAndSize);
        assert_eq!(region_class(full.propose_alloc(8)), 5);
    }

    #[test]
    fn frontier_never_repeats_an_address() {
        let mut oracle = FrontierOracle::new(MetadataMode::MarkerAndSize);
        let a = oracle.propose_alloc(32);
        let b = oracle.propose_alloc(32);
        oracle.release(a);
        let c = oracle.propose_alloc(32);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(oracle.released, vec![a]);
    }

    #[test]
    fn frontier_regions_of_one_class_are_adjacent() {
        let mut oracle = FrontierOracle::new(MetadataMode::Marker);
        let a = oracle.propose_alloc(8);
        let b = oracle.propose_alloc(8);
        assert_eq!(b, a + region_size(a));
    }

    #[test]
    fn frontier_declines_impossible_sizes() {
        let mut oracle = FrontierOracle::new(MetadataMode::Marker);
        assert_eq!(oracle.propose_alloc(u64::MAX), 0);
        assert_eq!(oracle.propose_alloc(u64::MAX - 7), 0);
    }

    #[test]
    fn poison_advice_stays_inside_the_range() {
        let mut oracle = FrontierOracle::new(MetadataMode::Marker);
        assert_eq!(oracle.propose_poison(8, 16), Some(8));
        assert_eq!(oracle.propose_poison(9, 32), Some(16));
        assert_eq!(oracle.propose_poison(9, 17), None);
        assert_eq!(oracle.propose_poison(16, 16), None);

        let mut declining = FrontierOracle::declining(MetadataMode::Marker);
        assert_eq!(declining.propose_poison(8, 64), None);
    }

    #[test]
    fn poison_advice_is_never_repeated() {
        let mut oracle = FrontierOracle::new(MetadataMode::Marker);
        assert_eq!(oracle.propose_poison(8, 32), Some(8));
        assert_eq!(oracle.propose_poison(8, 32), None);
        assert_eq!(oracle.propose_poison(16, 32), Some(16));
    }

    #[test]
    fn scripted_replays_in_order() {
        let mut oracle = ScriptedOracle::with_poisons([0x10, 0x20], [Some(0x18), None]);
        assert_eq!(oracle.propose_alloc(8), 0x10);
        assert_eq!(oracle.propose_poison(0, 0), Some(0x18));
        assert_eq!(oracle.propose_alloc(8), 0x20);
        assert_eq!(oracle.propose_poison(0, 0), None);
        oracle.release(0x10);
        assert_eq!(oracle.released, vec![0x10]);
    }

    #[test]
    fn scripted_exhaustion_answers_conservatively() {
        let mut oracle = ScriptedOracle::new([]);
        assert_eq!(oracle.propose_alloc(8), 0);
        assert_eq!(oracle.propose_poison(0, 0x100), None);
        assert_eq!(oracle.remaining_allocs(), 0);
    }
}
