//! Remote service acknowledgements.

use serde::{Deserialize, Serialize};

use crate::{RecordId, Timestamp};

/// Remote acknowledgement of a confirmed create.
///
/// The remote may assign its own identity; when `id` differs from the locally
/// generated placeholder, the engine rewrites the stored record and any
/// still-pending queue items to the confirmed ID.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreateAck {
    /// The identity the remote stored the record under.
    pub id: RecordId,
    /// The version timestamp the remote recorded.
    pub updated_at: Timestamp,
}

/// Remote acknowledgement of a confirmed update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateAck {
    /// The version timestamp the remote recorded.
    pub updated_at: Timestamp,
}
