//! CBOR encoding helpers for durable values.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Encodes a value as CBOR for durable storage.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the value cannot be represented.
pub fn to_cbor<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a CBOR value read back from storage.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if the bytes are not a valid encoding of
/// `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
}
