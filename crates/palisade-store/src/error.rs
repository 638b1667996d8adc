//! Error types for palisade-store

use palisade_types::RoleName;
use thiserror::Error;

/// Errors that can occur in metadata stores and transports
#[derive(Debug, Error)]
pub enum Error {
    /// The remote (or local store) has no metadata for the role
    ///
    /// Distinct from transport failure: publish uses this to decide the
    /// repository has never been pushed.
    #[error("no {role} metadata found")]
    MetaNotFound {
        /// The role that was requested
        role: RoleName,
    },

    /// Transport failure other than a missing document
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Document exceeds the caller's size cap
    #[error("{role} metadata exceeds the {max_size}-byte limit")]
    MetaTooLarge {
        /// The role that was requested
        role: RoleName,
        /// The cap that was exceeded
        max_size: u64,
    },

    /// The server key endpoint returned an unparseable key
    #[error("invalid key from server: {0}")]
    InvalidKey(#[from] palisade_types::Error),

    /// I/O error in the filesystem store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, Error>;
