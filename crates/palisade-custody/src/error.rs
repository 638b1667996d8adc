//! Error types for palisade-custody

use thiserror::Error;

/// Errors that can occur in key custody
#[derive(Debug, Error)]
pub enum Error {
    /// No key stored under the id
    #[error("no key with id {0}")]
    KeyNotFound(String),

    /// The passphrase did not decrypt the key
    #[error("wrong passphrase for key {0}")]
    WrongPassphrase(String),

    /// A different key already rests under the id
    #[error("a different key already exists with id {0}")]
    KeyExists(String),

    /// An id that cannot name a key file
    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    /// Key material failed to parse or convert
    #[error(transparent)]
    Crypto(#[from] palisade_crypto::Error),

    /// PEM or PKCS#8 structure error
    #[error("key encoding error: {0}")]
    Encoding(String),

    /// I/O error in the key directory
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for custody operations
pub type Result<T> = std::result::Result<T, Error>;
