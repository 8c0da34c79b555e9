//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random sync data
//! that maintains required invariants.

use craftsync_protocol::{ProjectRecord, RecordId, RecordKind, Timestamp};
use proptest::prelude::*;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Strategy for generating record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop::array::uniform16(any::<u8>())
        .prop_map(|bytes| RecordId::from_uuid(Uuid::from_bytes(bytes)))
}

/// Strategy for generating record kinds, weighted toward projects.
pub fn record_kind_strategy() -> impl Strategy<Value = RecordKind> {
    prop_oneof![
        3 => Just(RecordKind::Project),
        1 => Just(RecordKind::Template),
    ]
}

/// Strategy for generating timestamps within a plausible range.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0u64..4_102_444_800_000).prop_map(Timestamp::from_millis)
}

/// Strategy for generating design payloads.
///
/// Payloads are flat JSON objects with short lowercase keys, which is
/// enough structure to exercise serialization without modeling real
/// documents.
pub fn payload_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(
        prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
            prop::string::string_regex("[a-zA-Z0-9 ]{0,24}")
                .expect("Invalid regex")
                .prop_map(Value::String),
        ],
        1..6,
    )
    .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>()))
}

/// Strategy for generating whole records.
///
/// Both timestamps start equal, matching a freshly created record.
pub fn record_strategy() -> impl Strategy<Value = ProjectRecord> {
    (
        record_id_strategy(),
        record_kind_strategy(),
        payload_strategy(),
        timestamp_strategy(),
    )
        .prop_map(|(id, kind, payload, at)| ProjectRecord::with_id(id, kind, payload, at))
}

/// A synthetic local edit for sequence-based tests.
///
/// Update and delete target a slot rather than a concrete ID so a
/// generated sequence stays meaningful however many records are alive
/// when it runs: interpreters take the slot modulo the live record count.
#[derive(Debug, Clone)]
pub enum EditOp {
    /// Create a fresh record.
    Create {
        /// Record kind.
        kind: RecordKind,
        /// Initial payload.
        payload: Value,
    },
    /// Replace the payload of an existing record.
    Update {
        /// Index into the live record list, modulo its length.
        slot: usize,
        /// Replacement payload.
        payload: Value,
    },
    /// Delete an existing record.
    Delete {
        /// Index into the live record list, modulo its length.
        slot: usize,
    },
}

/// Strategy for generating a single edit.
pub fn edit_op_strategy() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        3 => (record_kind_strategy(), payload_strategy())
            .prop_map(|(kind, payload)| EditOp::Create { kind, payload }),
        3 => (any::<usize>(), payload_strategy())
            .prop_map(|(slot, payload)| EditOp::Update { slot, payload }),
        1 => any::<usize>().prop_map(|slot| EditOp::Delete { slot }),
    ]
}

/// Strategy for generating a sequence of edits.
pub fn edit_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<EditOp>> {
    prop::collection::vec(edit_op_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
