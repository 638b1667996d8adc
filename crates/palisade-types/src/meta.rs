//! Target file metadata

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::HexBytes;
use crate::error::{Error, Result};

/// Expected length of a sha256 digest
pub const SHA256_DIGEST_LEN: usize = 32;

/// Digest set keyed by algorithm name; sha256 is mandatory
pub type Hashes = BTreeMap<String, HexBytes>;

/// Length and digests of a target file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Size in bytes
    pub length: u64,
    /// Digests keyed by algorithm
    pub hashes: Hashes,
}

impl FileMeta {
    /// Hash a reader into file metadata, computing length and sha256
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut length: u64 = 0;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            length += n as u64;
        }

        let mut hashes = Hashes::new();
        hashes.insert(
            "sha256".to_string(),
            HexBytes::new(hasher.finalize().to_vec()),
        );
        Ok(FileMeta { length, hashes })
    }

    /// The sha256 digest, if present
    pub fn sha256(&self) -> Option<&HexBytes> {
        self.hashes.get("sha256")
    }

    /// The sha256 digest, required to be present and 32 bytes
    ///
    /// `name` only labels the error.
    pub fn require_sha256(&self, name: &str) -> Result<&HexBytes> {
        let digest = self
            .sha256()
            .ok_or_else(|| Error::MissingSha256(name.to_string()))?;
        if digest.len() != SHA256_DIGEST_LEN {
            return Err(Error::InvalidDigestLength(name.to_string(), digest.len()));
        }
        Ok(digest)
    }

    /// Check content against this metadata: length and sha256 must match
    pub fn matches(&self, content: &[u8]) -> bool {
        if content.len() as u64 != self.length {
            return false;
        }
        match self.sha256() {
            Some(expected) => {
                Sha256::digest(content).as_slice() == expected.as_slice()
            }
            None => false,
        }
    }
}

/// Snapshot/timestamp entry for a role's metadata file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFileMeta {
    /// Size in bytes of the serialized role document
    pub length: u64,
    /// Digests of the serialized role document
    pub hashes: Hashes,
    /// Version of the role document
    pub version: u64,
}

impl SnapshotFileMeta {
    /// Describe a serialized role document at a given version
    pub fn describe(content: &[u8], version: u64) -> Self {
        let mut hashes = Hashes::new();
        hashes.insert(
            "sha256".to_string(),
            HexBytes::new(Sha256::digest(content).to_vec()),
        );
        SnapshotFileMeta {
            length: content.len() as u64,
            hashes,
            version,
        }
    }
}
