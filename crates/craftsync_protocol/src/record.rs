//! Project records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RecordId, Timestamp};

/// The kind of a user-authored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A design project authored by the user.
    Project,
    /// A reusable starting-point template.
    Template,
}

impl RecordKind {
    /// Returns the wire name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Project => "project",
            RecordKind::Template => "template",
        }
    }

    /// Parses a wire name.
    ///
    /// Returns `None` for unknown kinds.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(RecordKind::Project),
            "template" => Some(RecordKind::Template),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-authored design record — the unit of synchronization.
///
/// The payload is an opaque JSON document owned by the editing surface; the
/// sync layer stores and transmits it without inspecting it. Conflict
/// resolution is whole-record, driven by `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Record identity.
    pub id: RecordId,
    /// What kind of record this is.
    pub kind: RecordKind,
    /// Opaque design document.
    pub payload: Value,
    /// When the record was created.
    pub created_at: Timestamp,
    /// Last modification, local or confirmed-remote.
    pub updated_at: Timestamp,
}

impl ProjectRecord {
    /// Creates a record with a fresh local ID.
    #[must_use]
    pub fn new(kind: RecordKind, payload: Value, now: Timestamp) -> Self {
        Self::with_id(RecordId::new(), kind, payload, now)
    }

    /// Creates a record with an explicit ID.
    #[must_use]
    pub fn with_id(id: RecordId, kind: RecordKind, payload: Value, now: Timestamp) -> Self {
        Self {
            id,
            kind,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the payload and bumps the version timestamp.
    pub fn apply_edit(&mut self, payload: Value, now: Timestamp) {
        self.payload = payload;
        self.touch(now);
    }

    /// Bumps `updated_at` to `now`, clamped to never move backwards.
    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = self.updated_at.max(now);
    }

    /// True if both copies carry the same version timestamp.
    #[must_use]
    pub fn same_version(&self, other: &ProjectRecord) -> bool {
        self.updated_at == other.updated_at
    }
}
