//! Encoding helpers for the notary wire format
//!
//! Digests travel as lowercase hex, key material as standard base64. The
//! helpers here keep those conventions in one place: a `HexBytes` newtype
//! for digest values and a serde module for base64 byte fields.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde helper for base64 encoding/decoding of byte fields
///
/// Use with `#[serde(with = "base64_bytes")]` on `Vec<u8>` fields.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Bytes that serialize as a lowercase hex string
///
/// Used for digest values in target and snapshot metadata, where the wire
/// format is hex rather than base64.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HexBytes(Vec<u8>);

impl HexBytes {
    /// Create from raw bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Create from a hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Get the raw bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Length of the raw bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for HexBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes_roundtrip() {
        let original = HexBytes::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"deadbeef\"");

        let parsed: HexBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_hex_bytes_rejects_bad_hex() {
        let result: Result<HexBytes, _> = serde_json::from_str("\"not-hex\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_base64_bytes_roundtrip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Wrapper {
            #[serde(with = "base64_bytes")]
            data: Vec<u8>,
        }

        let original = Wrapper {
            data: b"public key material".to_vec(),
        };
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
