//! Error types for palisade-types

use thiserror::Error;

/// Errors that can occur while building or decoding TUF metadata
#[derive(Debug, Error)]
pub enum Error {
    /// JSON serialization or parsing error (including canonical form)
    #[error("failed to encode or parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A role name outside the four top-level roles
    #[error("unknown role name: {0}")]
    UnknownRole(String),

    /// A role record that violates its structural invariants
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// A hash set missing the mandatory sha256 entry
    #[error("missing sha256 digest for {0}")]
    MissingSha256(String),

    /// A sha256 digest with the wrong length
    #[error("sha256 digest for {0} is {1} bytes, expected 32")]
    InvalidDigestLength(String, usize),

    /// I/O error while hashing target content
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for metadata operations
pub type Result<T> = std::result::Result<T, Error>;
