//! Guest memory substrate for the augury heap.
//!
//! The allocator in `augury-core` manages addresses inside a verifiable
//! execution environment. This crate simulates that environment's memory so
//! the allocator's safety protocol is observable and testable:
//!
//! - [`GuestMemory`]: sparse, zero-initialized 64-bit byte space with
//!   checked and unchecked access paths
//! - [`RangeSet`]: the accessibility intervals behind the checked paths
//! - word poisoning with the write-and-poison primitive double-allocation
//!   and use-after-free defenses are built on
//! - [`MemoryMetrics`]: global counters for substrate traffic
//!
//! Everything here is safe Rust; "unchecked" refers to the guest-level
//! enforcement being bypassed, not to `unsafe` code.

#![deny(unsafe_code)]

pub mod memory;
pub mod metrics;
pub mod ranges;

pub use memory::{GuestMemory, MemError, PAGE_SIZE, WORD_SIZE, containing_word};
pub use metrics::{MemoryMetrics, MetricsSnapshot, global_metrics};
pub use ranges::RangeSet;
