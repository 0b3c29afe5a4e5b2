//! JSON report model.
//!
//! A report is the machine-readable evidence of one scenario run: every
//! verdict the heap drew, the per-heap operation counters, the substrate
//! traffic delta over the run, and a digest of the last captured snapshot.

use serde::{Deserialize, Serialize};

use augury_core::{HeapStats, TraceReport, Verdict};
use augury_mem::MetricsSnapshot;

// ---- verdicts --------------------------------------------------------------

/// Serialized verdict kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Invalid,
    Bug,
}

impl From<Verdict> for VerdictKind {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Invalid => Self::Invalid,
            Verdict::Bug => Self::Bug,
        }
    }
}

/// One reported invariant failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub verdict: VerdictKind,
    pub reason: String,
}

impl From<TraceReport> for VerdictRecord {
    fn from(report: TraceReport) -> Self {
        Self {
            verdict: report.verdict.into(),
            reason: report.reason.to_string(),
        }
    }
}

// ---- counters --------------------------------------------------------------

/// Serialized per-heap operation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub allocations: u64,
    pub aligned_allocations: u64,
    pub deallocations: u64,
    pub reallocations: u64,
    pub bytes_requested: u64,
    pub bytes_copied: u64,
    pub slack_words_poisoned: u64,
    pub restores: u64,
}

impl From<HeapStats> for StatsRecord {
    fn from(stats: HeapStats) -> Self {
        Self {
            allocations: stats.allocations,
            aligned_allocations: stats.aligned_allocations,
            deallocations: stats.deallocations,
            reallocations: stats.reallocations,
            bytes_requested: stats.bytes_requested,
            bytes_copied: stats.bytes_copied,
            slack_words_poisoned: stats.slack_words_poisoned,
            restores: stats.restores,
        }
    }
}

/// Growth of the global substrate counters over the run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub checked_reads: u64,
    pub checked_writes: u64,
    pub unchecked_reads: u64,
    pub unchecked_writes: u64,
    pub poison_marks: u64,
    pub poison_rejects: u64,
    pub poison_faults: u64,
    pub access_faults: u64,
    pub bytes_copied: u64,
}

/// Counter growth between two snapshots of the global metrics.
#[must_use]
pub fn metrics_delta(before: MetricsSnapshot, after: MetricsSnapshot) -> MetricsDelta {
    MetricsDelta {
        checked_reads: after.checked_reads.saturating_sub(before.checked_reads),
        checked_writes: after.checked_writes.saturating_sub(before.checked_writes),
        unchecked_reads: after.unchecked_reads.saturating_sub(before.unchecked_reads),
        unchecked_writes: after.unchecked_writes.saturating_sub(before.unchecked_writes),
        poison_marks: after.poison_marks.saturating_sub(before.poison_marks),
        poison_rejects: after.poison_rejects.saturating_sub(before.poison_rejects),
        poison_faults: after.poison_faults.saturating_sub(before.poison_faults),
        access_faults: after.access_faults.saturating_sub(before.access_faults),
        bytes_copied: after.bytes_copied.saturating_sub(before.bytes_copied),
    }
}

// ---- snapshot digest -------------------------------------------------------

/// Digest of the last snapshot captured during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Extent start address.
    pub start: u64,
    /// Extent length in bytes.
    pub len: u64,
    /// Lowercase hex SHA-256 of the captured bytes.
    pub sha256: String,
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(&mut out, "{b:02x}").expect("writing to String should not fail");
    }
    out
}

/// Lowercase hex SHA-256 of a byte buffer.
#[must_use]
pub fn digest_hex(bytes: &[u8]) -> String {
    use sha2::Digest;
    hex_lower(&sha2::Sha256::digest(bytes))
}

// ---- report ----------------------------------------------------------------

/// Machine-readable outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name, echoed from the input.
    pub scenario: String,
    /// Operations applied.
    pub ops_run: usize,
    /// Every verdict the heap drew, in order.
    pub verdicts: Vec<VerdictRecord>,
    pub invalid_total: usize,
    pub bug_total: usize,
    /// True when no verdict was drawn and every scripted check passed.
    pub clean: bool,
    /// Per-heap counters, summed across restores.
    pub stats: StatsRecord,
    /// Substrate traffic attributable to the run.
    pub metrics: MetricsDelta,
    /// Digest of the last `snapshot` op, when one ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotRecord>,
    /// Scripted `fill`/`check` operations that faulted or mismatched.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub check_failures: Vec<String>,
}

impl ScenarioReport {
    /// Serialize the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_vectors() {
        // SHA-256 of the empty string.
        assert_eq!(
            digest_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn delta_saturates_instead_of_underflowing() {
        let mut before = MetricsSnapshot {
            checked_reads: 0,
            checked_writes: 0,
            unchecked_reads: 0,
            unchecked_writes: 0,
            poison_marks: 0,
            poison_rejects: 0,
            poison_faults: 0,
            access_faults: 0,
            bytes_copied: 0,
        };
        let after = before;
        before.checked_reads = 7;
        let delta = metrics_delta(before, after);
        assert_eq!(delta.checked_reads, 0);
        assert_eq!(delta.checked_writes, 0);
    }

    #[test]
    fn verdict_records_carry_the_reason() {
        let record: VerdictRecord = TraceReport {
            verdict: Verdict::Bug,
            reason: "freed pointer not the start of a region",
        }
        .into();
        assert_eq!(record.verdict, VerdictKind::Bug);
        assert_eq!(record.reason, "freed pointer not the start of a region");
    }
}
