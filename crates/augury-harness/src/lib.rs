//! Scenario harness for the augury heap.
//!
//! This crate provides:
//! - Scenario model: JSON description of a heap session (heap kind,
//!   metadata layout, oracle script, slot-based operations)
//! - Runner: executes a scenario against a real heap, collecting verdicts
//! - Report: JSON evidence (verdicts, counters, metrics delta, snapshot
//!   digest)

#![forbid(unsafe_code)]

pub mod report;
pub mod runner;
pub mod scenario;

pub use report::{
    MetricsDelta, ScenarioReport, SnapshotRecord, StatsRecord, VerdictKind, VerdictRecord,
    digest_hex, metrics_delta,
};
pub use runner::{HarnessError, run_scenario, run_scenario_file};
pub use scenario::{
    HeapKind, MetadataLayout, OracleScript, Scenario, ScenarioOp, example_scenario,
};
