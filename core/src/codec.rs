//! Key and value encoding shared by every index.
//!
//! Numeric keys are stored big-endian so that sled's lexicographic order is
//! also numeric order. Records are bincode.

use crate::error::{IndexError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

pub fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| IndexError::malformed(format!("{bytes:?}"), format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| IndexError::malformed("<encode>", e))
}

pub fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| IndexError::malformed(display_key(key), e))
}

pub fn decode_string(key: &[u8], bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| IndexError::malformed(display_key(key), e))
}

/// Renders a key for error messages: utf-8 when possible, otherwise the id.
pub fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if key.len() != 8 => s.to_string(),
        _ => match decode_id(key) {
            Ok(id) => id.to_string(),
            Err(_) => format!("{key:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_keys_sort_numerically() {
        let mut keys = vec![id_key(300), id_key(2), id_key(70_000)];
        keys.sort();
        let ids: Vec<u64> = keys.iter().map(|k| decode_id(k).unwrap()).collect();
        assert_eq!(ids, vec![2, 300, 70_000]);
    }

    #[test]
    fn short_id_is_malformed() {
        let err = decode_id(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { .. }));
    }
}
