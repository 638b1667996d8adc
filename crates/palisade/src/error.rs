//! The client error surface
//!
//! Collaborator errors are carried transparently, but callers match on
//! [`ErrorKind`] rather than on carrier structure, so the semantic kind
//! survives however deep the failure originated.

use thiserror::Error;

/// Errors surfaced by collection operations
#[derive(Debug, Error)]
pub enum Error {
    /// Publish on a collection with neither remote nor local state
    #[error("repository has not been initialized")]
    RepoNotInitialized,

    /// Action requested on a nonexistent collection directory
    #[error("repository does not exist")]
    RepoNotExist,

    /// Root validation produced an empty trusted key set
    #[error("could not validate the path to a trusted root")]
    NoTrustedRoot,

    /// Root signatures did not meet the threshold (or were otherwise
    /// unacceptable)
    #[error("root validation failed: {0}")]
    RootValidationFailed(String),

    /// Root key algorithm outside the supported set
    #[error("only RSA or ECDSA root keys are supported, found: {0}")]
    InvalidKeyAlgorithm(String),

    /// Named target absent from the signed targets role
    #[error("no target named {0}")]
    TargetNotFound(String),

    /// The change journal cannot be parsed, ordered, or applied
    #[error("changelist corrupt: {0}")]
    ChangelistCorrupt(String),

    /// Key custody failure (wrong passphrase, missing key, ...)
    #[error(transparent)]
    Custody(#[from] palisade_custody::Error),

    /// Store or transport failure
    #[error(transparent)]
    Store(#[from] palisade_store::Error),

    /// Trust-store failure
    #[error(transparent)]
    Trust(#[from] palisade_truststore::Error),

    /// TUF engine failure
    #[error(transparent)]
    Engine(#[from] palisade_tuf::Error),

    /// Metadata encoding or parsing failure
    #[error(transparent)]
    Encoding(#[from] palisade_types::Error),

    /// Cryptographic failure
    #[error(transparent)]
    Crypto(#[from] palisade_crypto::Error),

    /// I/O failure in the collection directory
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Semantic error kinds callers match on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Neither remote nor local state for the collection
    RepoNotInitialized,
    /// The collection directory does not exist
    RepoNotExist,
    /// Root validation yielded no trusted keys
    NoTrustedRoot,
    /// Root signatures did not verify at threshold
    RootValidationFailed,
    /// Unsupported root key algorithm
    InvalidKeyAlgorithm,
    /// Key custody has no such key
    KeyNotFound,
    /// Key custody could not decrypt with the passphrase
    WrongPassphrase,
    /// The change journal is unusable
    ChangelistCorrupt,
    /// Transport failure other than a missing document
    RemoteUnavailable,
    /// A role document was not found (remote 404 or missing file)
    MetaNotFound,
    /// Serialization to the wire encoding failed
    EncodingError,
    /// Named target absent
    TargetNotFound,
    /// Anything without a more specific kind
    Other,
}

impl Error {
    /// The semantic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RepoNotInitialized => ErrorKind::RepoNotInitialized,
            Error::RepoNotExist => ErrorKind::RepoNotExist,
            Error::NoTrustedRoot => ErrorKind::NoTrustedRoot,
            Error::RootValidationFailed(_) => ErrorKind::RootValidationFailed,
            Error::InvalidKeyAlgorithm(_) => ErrorKind::InvalidKeyAlgorithm,
            Error::TargetNotFound(_) => ErrorKind::TargetNotFound,
            Error::ChangelistCorrupt(_) => ErrorKind::ChangelistCorrupt,
            Error::Custody(e) => custody_kind(e),
            Error::Store(e) => store_kind(e),
            Error::Engine(palisade_tuf::Error::Store(e)) => store_kind(e),
            Error::Engine(palisade_tuf::Error::Types(_)) => ErrorKind::EncodingError,
            Error::Engine(_) => ErrorKind::Other,
            Error::Encoding(_) => ErrorKind::EncodingError,
            Error::Trust(_) | Error::Crypto(_) | Error::Io(_) => ErrorKind::Other,
        }
    }
}

fn custody_kind(e: &palisade_custody::Error) -> ErrorKind {
    match e {
        palisade_custody::Error::KeyNotFound(_) => ErrorKind::KeyNotFound,
        palisade_custody::Error::WrongPassphrase(_) => ErrorKind::WrongPassphrase,
        _ => ErrorKind::Other,
    }
}

fn store_kind(e: &palisade_store::Error) -> ErrorKind {
    match e {
        palisade_store::Error::MetaNotFound { .. } => ErrorKind::MetaNotFound,
        palisade_store::Error::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
        palisade_store::Error::InvalidKey(_) => ErrorKind::EncodingError,
        _ => ErrorKind::Other,
    }
}

/// Result type for collection operations
pub type Result<T> = std::result::Result<T, Error>;
