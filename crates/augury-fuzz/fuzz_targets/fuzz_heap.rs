#![no_main]
use libfuzzer_sys::fuzz_target;

use augury_core::{FrontierOracle, MetadataMode, OracleHeap, RecordingSink};

// Decodes the input as an alloc/free/realloc op stream against the honest
// frontier oracle. No honest sequence may ever draw a verdict, and block
// contents must survive until the block is freed or moved.
fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    let mode = if data[0] & 1 == 0 {
        MetadataMode::MarkerAndSize
    } else {
        MetadataMode::Marker
    };
    let sink = RecordingSink::new();
    let mut heap = OracleHeap::with_mode(FrontierOracle::new(mode), sink.clone(), mode);
    let mut live: Vec<(u64, u64, u8)> = Vec::new();

    for chunk in data[1..].chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let op = chunk[0] % 3;
        let size = u64::from(u16::from_le_bytes([chunk[1], chunk[2]])).clamp(1, 4096);
        let pattern = chunk[3];

        match op {
            0 => {
                let addr = heap.allocate(size);
                assert_ne!(addr, 0);
                for i in 0..size {
                    heap.mem.write_byte(addr + i, pattern).unwrap();
                }
                live.push((addr, size, pattern));
            }
            1 => {
                if let Some((addr, size, pattern)) = live.pop() {
                    for i in 0..size {
                        assert_eq!(heap.mem.read_byte(addr + i).unwrap(), pattern);
                    }
                    heap.deallocate(addr);
                }
            }
            _ => {
                // Marker-only regions do not record a size, so realloc on
                // them is scripted client misuse rather than an honest op.
                if mode.records_size() {
                    if let Some((addr, old_size, pattern)) = live.pop() {
                        let new_addr = heap.reallocate(addr, size);
                        assert_ne!(new_addr, 0);
                        for i in 0..old_size.min(size) {
                            assert_eq!(heap.mem.read_byte(new_addr + i).unwrap(), pattern);
                        }
                        for i in 0..size {
                            heap.mem.write_byte(new_addr + i, pattern).unwrap();
                        }
                        live.push((new_addr, size, pattern));
                    }
                }
            }
        }
        assert!(sink.is_clean(), "{:?}", sink.reasons());
    }

    for (addr, _, _) in live {
        heap.deallocate(addr);
    }
    assert!(sink.is_clean(), "{:?}", sink.reasons());
});
