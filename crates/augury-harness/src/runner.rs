//! Scenario execution engine.
//!
//! Drives a real heap with the scripted operations, collecting verdicts
//! through a shared recording sink. Scenario-authoring mistakes (an unbound
//! slot, a restore with nothing captured) are hard errors; everything the
//! heap itself objects to lands in the report as a verdict.

use std::collections::HashMap;
use std::mem;
use std::path::Path;

use thiserror::Error;

use augury_core::{
    AllocationOracle, BumpHeap, FrontierOracle, HeapSnapshot, HeapStats, MetadataMode, OracleHeap,
    RecordingSink, ScriptedOracle,
};
use augury_mem::{GuestMemory, global_metrics};

use crate::report::{ScenarioReport, SnapshotRecord, digest_hex, metrics_delta};
use crate::scenario::{HeapKind, OracleScript, Scenario, ScenarioOp};

/// Errors in the scenario input or its use of slots.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("scenario json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("op {index}: slot {slot} is not bound")]
    UnknownSlot { index: usize, slot: u32 },
    #[error("op {index}: restore with no snapshot captured")]
    RestoreWithoutSnapshot { index: usize },
}

// ---- heap dispatch ---------------------------------------------------------

enum ScenarioHeap {
    Oracle(OracleHeap<Box<dyn AllocationOracle>, RecordingSink>),
    Linear(BumpHeap<RecordingSink>),
}

impl ScenarioHeap {
    fn allocate(&mut self, size: u64) -> u64 {
        match self {
            Self::Oracle(heap) => heap.allocate(size),
            Self::Linear(heap) => heap.allocate(size),
        }
    }

    fn allocate_aligned(&mut self, size: u64, align: u64) -> u64 {
        match self {
            Self::Oracle(heap) => heap.allocate_aligned(size, align),
            Self::Linear(heap) => heap.allocate_aligned(size, align),
        }
    }

    fn deallocate(&mut self, addr: u64) {
        match self {
            Self::Oracle(heap) => heap.deallocate(addr),
            Self::Linear(heap) => heap.deallocate(addr),
        }
    }

    fn reallocate(&mut self, addr: u64, new_size: u64) -> u64 {
        match self {
            Self::Oracle(heap) => heap.reallocate(addr, new_size),
            Self::Linear(heap) => heap.reallocate(addr, new_size),
        }
    }

    fn snapshot(&self) -> HeapSnapshot {
        match self {
            Self::Oracle(heap) => heap.snapshot(),
            Self::Linear(heap) => heap.snapshot(),
        }
    }

    fn snapshot_bytes(&self) -> Vec<u8> {
        match self {
            Self::Oracle(heap) => heap.snapshot_bytes(),
            Self::Linear(heap) => heap.snapshot_bytes(),
        }
    }

    fn restore_bytes(&mut self, addr: u64, bytes: &[u8]) {
        match self {
            Self::Oracle(heap) => heap.restore_bytes(addr, bytes),
            Self::Linear(heap) => heap.restore_bytes(addr, bytes),
        }
    }

    fn stats(&self) -> HeapStats {
        match self {
            Self::Oracle(heap) => heap.stats(),
            Self::Linear(heap) => heap.stats(),
        }
    }

    fn mem(&self) -> &GuestMemory {
        match self {
            Self::Oracle(heap) => &heap.mem,
            Self::Linear(heap) => &heap.mem,
        }
    }

    fn mem_mut(&mut self) -> &mut GuestMemory {
        match self {
            Self::Oracle(heap) => &mut heap.mem,
            Self::Linear(heap) => &mut heap.mem,
        }
    }
}

fn build_oracle(script: &OracleScript, mode: MetadataMode) -> Box<dyn AllocationOracle> {
    match script {
        OracleScript::Frontier => Box::new(FrontierOracle::new(mode)),
        OracleScript::FrontierDeclining => Box::new(FrontierOracle::declining(mode)),
        OracleScript::Scripted { allocs, poisons } => Box::new(ScriptedOracle::with_poisons(
            allocs.iter().copied(),
            poisons.iter().copied(),
        )),
    }
}

fn build_heap(scenario: &Scenario, sink: RecordingSink, mode: MetadataMode) -> ScenarioHeap {
    match scenario.heap {
        HeapKind::Oracle => ScenarioHeap::Oracle(OracleHeap::with_mode(
            build_oracle(&scenario.oracle, mode),
            sink,
            mode,
        )),
        HeapKind::Linear => ScenarioHeap::Linear(BumpHeap::new(sink)),
    }
}

fn add_stats(a: HeapStats, b: HeapStats) -> HeapStats {
    HeapStats {
        allocations: a.allocations + b.allocations,
        aligned_allocations: a.aligned_allocations + b.aligned_allocations,
        deallocations: a.deallocations + b.deallocations,
        reallocations: a.reallocations + b.reallocations,
        bytes_requested: a.bytes_requested + b.bytes_requested,
        bytes_copied: a.bytes_copied + b.bytes_copied,
        slack_words_poisoned: a.slack_words_poisoned + b.slack_words_poisoned,
        restores: a.restores + b.restores,
    }
}

// ---- runner ----------------------------------------------------------------

/// Execute a scenario against a fresh heap and summarize the evidence.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, HarnessError> {
    let mode = MetadataMode::from(scenario.layout);
    let sink = RecordingSink::new();
    let mut heap = build_heap(scenario, sink.clone(), mode);

    let mut slots: HashMap<u32, u64> = HashMap::new();
    let mut captured: Option<(HeapSnapshot, Vec<u8>)> = None;
    let mut snapshot_record: Option<SnapshotRecord> = None;
    // Stats of heaps retired by restores; the live heap's stats are added
    // at the end.
    let mut retired_stats = HeapStats::new();
    let mut check_failures: Vec<String> = Vec::new();

    let metrics_before = global_metrics().snapshot();

    for (index, op) in scenario.ops.iter().enumerate() {
        match *op {
            ScenarioOp::Alloc { slot, size } => {
                let addr = heap.allocate(size);
                slots.insert(slot, addr);
            }
            ScenarioOp::AllocAligned { slot, size, align } => {
                let addr = heap.allocate_aligned(size, align);
                slots.insert(slot, addr);
            }
            ScenarioOp::Free { slot } => {
                let addr = lookup(&slots, index, slot)?;
                heap.deallocate(addr);
            }
            ScenarioOp::Realloc { slot, size } => {
                let addr = lookup(&slots, index, slot)?;
                let new_addr = heap.reallocate(addr, size);
                slots.insert(slot, new_addr);
            }
            ScenarioOp::Fill { slot, byte, len } => {
                let addr = lookup(&slots, index, slot)?;
                for i in 0..len {
                    if let Err(err) = heap.mem_mut().write_byte(addr.wrapping_add(i), byte) {
                        check_failures
                            .push(format!("op {index}: fill at {addr:#x}+{i} faulted: {err}"));
                        break;
                    }
                }
            }
            ScenarioOp::Check { slot, byte, len } => {
                let addr = lookup(&slots, index, slot)?;
                for i in 0..len {
                    match heap.mem().read_byte(addr.wrapping_add(i)) {
                        Ok(got) if got == byte => {}
                        Ok(got) => {
                            check_failures.push(format!(
                                "op {index}: check at {addr:#x}+{i}: expected {byte:#04x}, got {got:#04x}"
                            ));
                            break;
                        }
                        Err(err) => {
                            check_failures.push(format!(
                                "op {index}: check at {addr:#x}+{i} faulted: {err}"
                            ));
                            break;
                        }
                    }
                }
            }
            ScenarioOp::Snapshot => {
                let snap = heap.snapshot();
                let bytes = heap.snapshot_bytes();
                snapshot_record = Some(SnapshotRecord {
                    start: snap.start,
                    len: snap.len,
                    sha256: digest_hex(&bytes),
                });
                captured = Some((snap, bytes));
            }
            ScenarioOp::Restore => {
                let Some((snap, bytes)) = captured.as_ref() else {
                    return Err(HarnessError::RestoreWithoutSnapshot { index });
                };
                retired_stats = add_stats(retired_stats, heap.stats());
                heap = match heap {
                    ScenarioHeap::Oracle(mut old) => {
                        // Carry the oracle over so a script keeps its place.
                        let oracle =
                            mem::replace(&mut old.oracle, Box::new(FrontierOracle::new(mode)));
                        ScenarioHeap::Oracle(OracleHeap::with_mode(oracle, sink.clone(), mode))
                    }
                    ScenarioHeap::Linear(_) => ScenarioHeap::Linear(BumpHeap::new(sink.clone())),
                };
                heap.restore_bytes(snap.start, bytes);
            }
        }
    }

    let metrics_after = global_metrics().snapshot();

    let verdicts: Vec<_> = sink.reports().into_iter().map(Into::into).collect();
    let clean = sink.is_clean() && check_failures.is_empty();
    Ok(ScenarioReport {
        scenario: scenario.name.clone(),
        ops_run: scenario.ops.len(),
        verdicts,
        invalid_total: sink.invalid_count(),
        bug_total: sink.bug_count(),
        clean,
        stats: add_stats(retired_stats, heap.stats()).into(),
        metrics: metrics_delta(metrics_before, metrics_after),
        snapshot: snapshot_record,
        check_failures,
    })
}

/// Load a scenario from a JSON file and run it.
pub fn run_scenario_file(path: &Path) -> Result<ScenarioReport, HarnessError> {
    let text = std::fs::read_to_string(path)?;
    let scenario = Scenario::from_json(&text)?;
    run_scenario(&scenario)
}

fn lookup(slots: &HashMap<u32, u64>, index: usize, slot: u32) -> Result<u64, HarnessError> {
    slots
        .get(&slot)
        .copied()
        .ok_or(HarnessError::UnknownSlot { index, slot })
}
