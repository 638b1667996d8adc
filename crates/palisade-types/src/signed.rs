//! Signed metadata envelopes and canonical JSON
//!
//! The payload of an envelope is kept as a JSON value rather than a typed
//! struct so that signature verification operates over exactly the bytes
//! that were signed, independent of field ordering in the source document.

use olpc_cjson::CanonicalFormatter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::Signature;

/// Serialize a value to canonical JSON
///
/// Canonical form sorts object keys and strips insignificant whitespace,
/// giving every document a single byte representation to sign and hash.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// A signed role document: payload plus signatures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signed {
    /// The role payload, as parsed JSON
    pub signed: serde_json::Value,
    /// Signatures over the canonical form of `signed`
    pub signatures: Vec<Signature>,
}

impl Signed {
    /// Build an envelope from a typed payload and its signatures
    pub fn from_payload<T: Serialize>(payload: &T, signatures: Vec<Signature>) -> Result<Self> {
        Ok(Self {
            signed: serde_json::to_value(payload)?,
            signatures,
        })
    }

    /// The canonical bytes signatures are computed over
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        to_canonical_json(&self.signed)
    }

    /// Parse the payload into a typed role document
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.signed.clone())?)
    }

    /// Serialize the whole envelope to its wire encoding
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        to_canonical_json(self)
    }

    /// Parse an envelope from wire bytes
    pub fn from_wire(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }
}
