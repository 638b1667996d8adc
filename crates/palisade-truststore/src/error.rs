//! Error types for palisade-truststore

use thiserror::Error;

/// Errors that can occur in trust-store operations
#[derive(Debug, Error)]
pub enum Error {
    /// No certificate with the requested fingerprint
    #[error("no certificate with fingerprint {0}")]
    NotFound(String),

    /// Certificate rejected by the store's admission filter
    #[error("certificate rejected by store filter: {0}")]
    Rejected(String),

    /// Leaf Common Name does not match the collection
    #[error("certificate common name {actual:?} does not match {expected}")]
    CommonNameMismatch {
        /// The GUN the chain was verified against
        expected: String,
        /// The CN found on the leaf
        actual: Option<String>,
    },

    /// No path from the leaf to a trusted CA anchor
    #[error("no trusted chain: {0}")]
    UntrustedChain(String),

    /// Certificate parsing or signature error
    #[error(transparent)]
    Certificate(#[from] palisade_crypto::Error),

    /// I/O error reading or writing the trust directory
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trust-store operations
pub type Result<T> = std::result::Result<T, Error>;
