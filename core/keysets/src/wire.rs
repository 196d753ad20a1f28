//! Wire encoding of keys and keysets.
//!
//! This is a thin wrapper around the bincode v2 API that uses the legacy
//! configuration, so that blobs stay byte-compatible with v1 encodings, and
//! that ignores the length info that v2 provides.

use crate::consts::{WIRE_BIG_DESER_SIZE_LIMIT, WIRE_SMALL_DESER_SIZE_LIMIT};
use crate::error::{KeysetError, KeysetResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// wrapper around bincode::serde::encode_to_vec that uses the legacy config
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(value, bincode::config::legacy())
}

/// wrapper around bincode::serde::decode_from_slice that discards the length info and uses the legacy config
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::error::DecodeError> {
    bincode::serde::decode_from_slice(
        bytes,
        bincode::config::legacy().with_limit::<WIRE_BIG_DESER_SIZE_LIMIT>(),
    )
    .map(|t| t.0)
}

/// Same as [deserialize] with the tighter limit used for single keys received from another node.
pub fn deserialize_safe<T: DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, bincode::error::DecodeError> {
    bincode::serde::decode_from_slice(
        bytes,
        bincode::config::legacy().with_limit::<WIRE_SMALL_DESER_SIZE_LIMIT>(),
    )
    .map(|t| t.0)
}

/// Two-way mapping between a key object and its wire blob.
///
/// Implemented by every key kind and by the keyset aggregates.
pub trait Wire: Serialize + DeserializeOwned {
    fn to_wire(&self) -> KeysetResult<Vec<u8>> {
        serialize(self).map_err(|e| KeysetError::Encoding(e.to_string()))
    }

    fn from_wire(bytes: &[u8]) -> KeysetResult<Self> {
        deserialize(bytes).map_err(|e| KeysetError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_config_has_fixed_width_lengths() {
        let bytes = serialize(&vec![1u8, 2, 3]).unwrap();
        // u64 length prefix followed by the payload
        assert_eq!(bytes, vec![3, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3]);
        let back: Vec<u8> = deserialize(&bytes).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = serialize(&vec![7u64; 16]).unwrap();
        assert!(deserialize::<Vec<u64>>(&bytes[..bytes.len() - 1]).is_err());
        assert!(deserialize_safe::<Vec<u64>>(&bytes[..4]).is_err());
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(deserialize::<Vec<u8>>(&bytes).is_err());
    }
}
