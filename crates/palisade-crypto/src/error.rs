//! Error types for palisade-crypto

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Debug, Error)]
pub enum Error {
    /// Key generation error
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    /// Signing error
    #[error("signing error: {0}")]
    Signing(String),

    /// Signature verification failed
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// Invalid key format
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Algorithm outside the supported set for the operation
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Certificate parsing or validation error
    #[error("certificate error: {0}")]
    InvalidCertificate(String),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    Pem(String),

    /// DER encoding/decoding error
    #[error("DER error: {0}")]
    Der(String),

    /// Certificate minting error
    #[error("certificate minting error: {0}")]
    Minting(String),
}

impl From<der::Error> for Error {
    fn from(e: der::Error) -> Self {
        Error::Der(e.to_string())
    }
}

impl From<pkcs8::Error> for Error {
    fn from(e: pkcs8::Error) -> Self {
        Error::InvalidKeyFormat(e.to_string())
    }
}

impl From<spki::Error> for Error {
    fn from(e: spki::Error) -> Self {
        Error::InvalidKeyFormat(e.to_string())
    }
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, Error>;
