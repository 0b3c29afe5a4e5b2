use augury_core::region::class_base;
use augury_core::{
    FrontierOracle, MetadataMode, OracleHeap, RecordingSink, ScriptedOracle, Verdict,
};

#[test]
fn double_allocation_is_invalid() {
    let base = class_base(5, 1);
    let sink = RecordingSink::new();
    let mut heap = OracleHeap::new(ScriptedOracle::new([base, base]), sink.clone());
    heap.allocate(8);
    assert!(sink.is_clean());
    heap.allocate(8);
    // The first allocation poisoned both metadata words, and validation
    // reports every violation it sees before moving on.
    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.verdict, Verdict::Invalid);
        assert!(report.verdict.is_fatal());
        assert_eq!(report.reason, "allocation metadata word is already poisoned");
    }
}

#[test]
fn freed_regions_are_never_reissued() {
    // Poison is never cleared, so even a free between the two proposals
    // cannot make the same region honest again.
    let base = class_base(4, 1);
    let sink = RecordingSink::new();
    let mut heap = OracleHeap::with_mode(
        ScriptedOracle::new([base, base]),
        sink.clone(),
        MetadataMode::Marker,
    );
    let addr = heap.allocate(8);
    heap.deallocate(addr);
    assert!(sink.is_clean(), "{:?}", sink.reasons());
    heap.allocate(8);
    assert_eq!(
        sink.reasons(),
        vec!["allocation metadata word is already poisoned"]
    );
    assert_eq!(sink.invalid_count(), 1);
}

#[test]
fn misaligned_free_is_a_bug_and_execution_continues() {
    let sink = RecordingSink::new();
    let mut heap =
        OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), sink.clone());
    let addr = heap.allocate(8);
    heap.deallocate(addr + 4);

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].verdict, Verdict::Bug);
    assert!(!reports[0].verdict.is_fatal());
    assert_eq!(reports[0].reason, "freed pointer not the start of a region");

    // Bug verdicts never stop the session.
    sink.clear();
    let next = heap.allocate(16);
    assert_ne!(next, 0);
    assert!(sink.is_clean(), "{:?}", sink.reasons());
}

#[test]
fn poison_survives_the_whole_region_lifecycle() {
    let sink = RecordingSink::new();
    let mut heap =
        OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), sink.clone());

    // Size 8 lands in a 32-byte region: slack advice poisons addr+8 on
    // allocation and addr itself on free.
    let addr = heap.allocate(8);
    heap.deallocate(addr);
    assert!(sink.is_clean(), "{:?}", sink.reasons());
    assert!(heap.mem.is_poisoned(addr));
    assert!(heap.mem.is_poisoned(addr + 8));

    for word in [addr, addr + 8] {
        assert!(heap.mem.read_word(word).is_err());
        assert!(heap.mem.write_word(word, 7).is_err());
        assert!(heap.mem.write_and_poison(word, 7).is_err());
    }
}

#[test]
fn realloc_preserves_the_prefix_in_both_directions() {
    let sink = RecordingSink::new();
    let mut heap =
        OracleHeap::new(FrontierOracle::new(MetadataMode::MarkerAndSize), sink.clone());

    let addr = heap.allocate(8);
    for i in 0..8u8 {
        heap.mem.write_byte(addr + u64::from(i), 0xD0 + i).unwrap();
    }

    let grown = heap.reallocate(addr, 16);
    for i in 0..8u8 {
        assert_eq!(heap.mem.read_byte(grown + u64::from(i)).unwrap(), 0xD0 + i);
    }

    let shrunk = heap.reallocate(grown, 4);
    for i in 0..4u8 {
        assert_eq!(heap.mem.read_byte(shrunk + u64::from(i)).unwrap(), 0xD0 + i);
    }

    assert!(sink.is_clean(), "{:?}", sink.reasons());
    assert_eq!(heap.stats().bytes_copied, 8 + 4);
    assert_eq!(heap.stats().reallocations, 2);
}
