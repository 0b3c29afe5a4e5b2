//! JSON scenario model.
//!
//! A scenario names a heap shape (kind, metadata layout, oracle script) and
//! a list of operations over numbered slots. Slots are scenario-local names
//! for addresses: an `alloc` binds the returned address to its slot, and
//! later operations refer to the slot instead of a raw address, so a
//! scenario never hard-codes oracle placement.

use serde::{Deserialize, Serialize};

use augury_core::MetadataMode;

// ---- heap shape ------------------------------------------------------------

/// Which allocator a scenario drives.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeapKind {
    /// Oracle-driven region heap.
    #[default]
    Oracle,
    /// Linear bump heap, no oracle.
    Linear,
}

/// Metadata layout selector, mirroring the core mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataLayout {
    /// Marker word only.
    Marker,
    /// Marker word plus recorded size.
    #[default]
    MarkerAndSize,
}

impl From<MetadataLayout> for MetadataMode {
    fn from(layout: MetadataLayout) -> Self {
        match layout {
            MetadataLayout::Marker => MetadataMode::Marker,
            MetadataLayout::MarkerAndSize => MetadataMode::MarkerAndSize,
        }
    }
}

/// How the oracle answers during the run. Ignored by linear scenarios.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OracleScript {
    /// Honest frontier placement with slack-word advice.
    #[default]
    Frontier,
    /// Honest frontier placement, declining every poison request.
    FrontierDeclining,
    /// Canned answers, exercised in script order. Running past the end of
    /// `allocs` yields the null address; past the end of `poisons`, declines.
    Scripted {
        allocs: Vec<u64>,
        #[serde(default)]
        poisons: Vec<Option<u64>>,
    },
}

// ---- operations ------------------------------------------------------------

/// One scripted heap operation.
///
/// `free` leaves its slot bound, so freeing the same slot again scripts a
/// double free. `restore` rebuilds the heap from the bytes captured by the
/// most recent `snapshot`; blocks outside the captured extent are gone
/// afterwards, though their slots stay bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioOp {
    /// Allocate `size` bytes and bind the result to `slot`.
    Alloc { slot: u32, size: u64 },
    /// Allocate `size` bytes at the given alignment and bind to `slot`.
    AllocAligned { slot: u32, size: u64, align: u64 },
    /// Free the address bound to `slot`.
    Free { slot: u32 },
    /// Reallocate `slot` to `size` bytes and rebind it.
    Realloc { slot: u32, size: u64 },
    /// Fill the first `len` bytes of `slot` with `byte`.
    Fill { slot: u32, byte: u8, len: u64 },
    /// Check that the first `len` bytes of `slot` all equal `byte`.
    Check { slot: u32, byte: u8, len: u64 },
    /// Capture the heap extent and its bytes.
    Snapshot,
    /// Rebuild the heap and replay the captured snapshot onto it.
    Restore,
}

// ---- scenario --------------------------------------------------------------

/// A complete scripted heap session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier, echoed into the report.
    pub name: String,
    /// Allocator under test.
    #[serde(default)]
    pub heap: HeapKind,
    /// Metadata layout for oracle heaps.
    #[serde(default)]
    pub layout: MetadataLayout,
    /// Oracle behavior for oracle heaps.
    #[serde(default)]
    pub oracle: OracleScript,
    /// Operations, applied in order.
    pub ops: Vec<ScenarioOp>,
}

impl Scenario {
    /// Parse a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the scenario to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A small self-contained scenario, used by the `example` subcommand and as
/// a smoke input for the runner.
#[must_use]
pub fn example_scenario() -> Scenario {
    Scenario {
        name: "smoke".to_string(),
        heap: HeapKind::Oracle,
        layout: MetadataLayout::MarkerAndSize,
        oracle: OracleScript::Frontier,
        ops: vec![
            ScenarioOp::Alloc { slot: 0, size: 64 },
            ScenarioOp::Fill {
                slot: 0,
                byte: 0xAB,
                len: 64,
            },
            ScenarioOp::Alloc { slot: 1, size: 16 },
            ScenarioOp::Check {
                slot: 0,
                byte: 0xAB,
                len: 64,
            },
            ScenarioOp::Free { slot: 1 },
            ScenarioOp::Realloc { slot: 0, size: 128 },
            ScenarioOp::Check {
                slot: 0,
                byte: 0xAB,
                len: 64,
            },
            ScenarioOp::Free { slot: 0 },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_round_trips_through_json() {
        let scenario = example_scenario();
        let json = scenario.to_json().unwrap();
        let parsed = Scenario::from_json(&json).unwrap();
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn shape_fields_default_when_omitted() {
        let scenario = Scenario::from_json(
            r#"{ "name": "bare", "ops": [ { "op": "alloc", "slot": 0, "size": 8 } ] }"#,
        )
        .unwrap();
        assert_eq!(scenario.heap, HeapKind::Oracle);
        assert_eq!(scenario.layout, MetadataLayout::MarkerAndSize);
        assert_eq!(scenario.oracle, OracleScript::Frontier);
        assert_eq!(scenario.ops, vec![ScenarioOp::Alloc { slot: 0, size: 8 }]);
    }

    #[test]
    fn op_tags_parse_in_snake_case() {
        let scenario = Scenario::from_json(
            r#"{
                "name": "tags",
                "heap": "linear",
                "oracle": { "kind": "scripted", "allocs": [1024] },
                "ops": [
                    { "op": "alloc_aligned", "slot": 0, "size": 8, "align": 64 },
                    { "op": "fill", "slot": 0, "byte": 1, "len": 8 },
                    { "op": "snapshot" },
                    { "op": "restore" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.heap, HeapKind::Linear);
        assert_eq!(
            scenario.oracle,
            OracleScript::Scripted {
                allocs: vec![1024],
                poisons: Vec::new(),
            }
        );
        assert_eq!(scenario.ops.len(), 4);
        assert_eq!(scenario.ops[2], ScenarioOp::Snapshot);
    }
}
