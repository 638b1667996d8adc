//! The caller-facing target type
//!
//! External applications deal in names, digests, and lengths; the TUF
//! data types stay internal to the workspace.

use std::fs::File;
use std::path::Path;

use palisade_types::{FileMeta, Hashes};

use crate::error::Result;

/// A published (or to-be-published) piece of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Path-like name the content is published under
    pub name: String,
    /// Digests keyed by algorithm; sha256 is always present
    pub hashes: Hashes,
    /// Size in bytes
    pub length: u64,
}

impl Target {
    /// Build a target by hashing a local file
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let meta = FileMeta::from_reader(file)?;
        Ok(Target {
            name: name.into(),
            hashes: meta.hashes,
            length: meta.length,
        })
    }

    /// The file metadata journaled for this target
    pub(crate) fn to_meta(&self) -> FileMeta {
        FileMeta {
            length: self.length,
            hashes: self.hashes.clone(),
        }
    }

    /// Project a signed targets entry back to the caller-facing type
    pub(crate) fn from_meta(name: &str, meta: &FileMeta) -> Self {
        Target {
            name: name.to_string(),
            hashes: meta.hashes.clone(),
            length: meta.length,
        }
    }

    /// The sha256 digest as lowercase hex, if present
    pub fn sha256_hex(&self) -> Option<String> {
        self.hashes.get("sha256").map(|h| h.to_string())
    }
}
