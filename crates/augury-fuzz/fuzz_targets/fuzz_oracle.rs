#![no_main]
use libfuzzer_sys::fuzz_target;

use augury_core::region::{is_region_start, region_size};
use augury_core::{OracleHeap, RecordingSink, ScriptedOracle};

// Feeds raw fuzz bytes to the heap as oracle answers. The heap must never
// panic on a hostile oracle, and any allocation that draws no verdict must
// satisfy the structural invariants the validation claims to enforce.
fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }

    let mut allocs = Vec::new();
    let mut poisons = Vec::new();
    for (i, chunk) in data.chunks_exact(8).enumerate() {
        let v = u64::from_le_bytes(chunk.try_into().unwrap());
        if i % 2 == 0 {
            allocs.push(v);
        } else {
            poisons.push((v != 0).then_some(v));
        }
    }

    let sink = RecordingSink::new();
    let oracle = ScriptedOracle::with_poisons(allocs.clone(), poisons);
    let mut heap = OracleHeap::new(oracle, sink.clone());

    let sizes = [1u64, 8, 9, 16, 24, 4096];
    let mut accepted = Vec::new();
    for (i, _) in allocs.iter().enumerate() {
        let size = sizes[i % sizes.len()];
        let before = sink.reports().len();
        let addr = heap.allocate(size);
        if sink.reports().len() == before {
            assert!(is_region_start(addr));
            assert!(region_size(addr) >= size + heap.metadata_mode().bytes());
            accepted.push(addr);
        }
        if i % 3 == 2 {
            if let Some(addr) = accepted.pop() {
                heap.deallocate(addr);
            }
        }
    }
});
