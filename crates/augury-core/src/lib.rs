//! Oracle-validated region heap.
//!
//! The heap cooperates with an untrusted address-choosing oracle: placement
//! decisions come from outside, and every choice is validated against the
//! region encoding before it is trusted. Invariant violations report through
//! a two-outcome channel (Invalid condemns the execution trace, Bug records
//! client misuse) and control continues deterministically either way.
//!
//! - [`heap::OracleHeap`]: oracle-driven allocate/free/realloc over regions.
//! - [`bump::BumpHeap`]: deterministic no-oracle fallback mode.
//! - [`oracle`]: the chooser trait plus honest and scripted implementations.
//! - [`region`]: the power-of-two region encoding in high address bits.
//! - [`snapshot`]: checkpoint extents and restore replay.
//! - [`trace`]: the two-outcome verdict channel and its sinks.

#![deny(unsafe_code)]

pub mod bump;
pub mod config;
pub mod heap;
pub mod oracle;
pub mod region;
pub mod snapshot;
pub mod stats;
pub mod trace;

pub use bump::BumpHeap;
pub use config::{DebugMode, debug_enabled};
pub use heap::OracleHeap;
pub use oracle::{AllocationOracle, FrontierOracle, PoisonPolicy, ScriptedOracle};
pub use region::{MetadataMode, is_region_start, region_class, region_size};
pub use snapshot::{HEAP_START, HeapSnapshot};
pub use stats::HeapStats;
pub use trace::{RecordingSink, StderrSink, TraceReport, TraceSink, Verdict, bug_if, valid_if};
