//! Conflict policy and resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ProjectRecord, RecordId, Timestamp};

/// Which side survives a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
    /// The local record is kept; the remote copy is discarded for this pull.
    Local,
    /// The remote record overwrites the local copy wholesale.
    Remote,
}

/// Policy for resolving a divergent record during pull.
///
/// Resolution is whole-record: the winner replaces the loser outright and
/// fields are never merged. Two copies are divergent when their `updated_at`
/// timestamps differ; equal timestamps are treated as the same version and
/// resolved before any policy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// The local copy always wins.
    Local,
    /// The remote copy always wins.
    Remote,
    /// The strictly later `updated_at` wins; ties keep local.
    #[default]
    Newest,
}

impl ConflictPolicy {
    /// Resolves a conflict between divergent local and remote copies.
    #[must_use]
    pub fn resolve(&self, local: &ProjectRecord, remote: &ProjectRecord) -> ConflictWinner {
        match self {
            ConflictPolicy::Local => ConflictWinner::Local,
            ConflictPolicy::Remote => ConflictWinner::Remote,
            ConflictPolicy::Newest => {
                if remote.updated_at > local.updated_at {
                    ConflictWinner::Remote
                } else {
                    ConflictWinner::Local
                }
            }
        }
    }

    /// Returns the configuration name for this policy.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Local => "local",
            ConflictPolicy::Remote => "remote",
            ConflictPolicy::Newest => "newest",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected divergence between local and remote copies of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// The divergent record.
    pub record_id: RecordId,
    /// Version timestamp of the local copy.
    pub local_updated_at: Timestamp,
    /// Version timestamp of the remote copy.
    pub remote_updated_at: Timestamp,
    /// Who won under the active policy.
    pub winner: ConflictWinner,
}

impl Conflict {
    /// Records a resolved conflict.
    #[must_use]
    pub fn new(local: &ProjectRecord, remote: &ProjectRecord, winner: ConflictWinner) -> Self {
        Self {
            record_id: local.id,
            local_updated_at: local.updated_at,
            remote_updated_at: remote.updated_at,
            winner,
        }
    }
}
