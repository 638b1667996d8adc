//! Error types for palisade-tuf

use chrono::{DateTime, Utc};
use palisade_types::RoleName;
use thiserror::Error;

/// Errors that can occur in the TUF engine
#[derive(Debug, Error)]
pub enum Error {
    /// Metadata encoding or parsing error
    #[error(transparent)]
    Types(#[from] palisade_types::Error),

    /// Store or transport failure while pulling roles
    #[error(transparent)]
    Store(#[from] palisade_store::Error),

    /// A key entry whose claimed id does not match its content
    #[error("key id {claimed} does not match computed id {computed}")]
    KeyIdMismatch {
        /// Id the document claimed
        claimed: String,
        /// Id derived from the key's canonical bytes
        computed: String,
    },

    /// A role record referencing a key the database does not hold
    #[error("role {role} references unknown key {key_id}")]
    UnknownKey {
        /// The role being added
        role: RoleName,
        /// The missing key id
        key_id: String,
    },

    /// Operation requires a role document the engine does not hold
    #[error("{0} metadata has not been loaded")]
    NotLoaded(RoleName),

    /// The key database has no record for a role
    #[error("no {0} role in the key database")]
    MissingRole(RoleName),

    /// Delegated targets roles are not supported
    #[error("{0} is not a supported targets role")]
    UnknownTargetsRole(RoleName),

    /// Fewer valid signatures than the role's threshold
    #[error("{role}: {valid} valid signature(s), threshold is {threshold}")]
    VerificationFailed {
        /// The role whose document failed
        role: RoleName,
        /// Distinct valid signatures found
        valid: usize,
        /// Required threshold
        threshold: u32,
    },

    /// Metadata past its expiry
    #[error("{role} metadata expired at {expired}")]
    Expired {
        /// The expired role
        role: RoleName,
        /// When it expired
        expired: DateTime<Utc>,
    },

    /// A version lower than the one already trusted
    #[error("{role} version went backwards: trusted {current}, received {received}")]
    VersionRollback {
        /// The role whose version regressed
        role: RoleName,
        /// Version currently trusted
        current: u64,
        /// Version received
        received: u64,
    },

    /// Fetched metadata does not match its parent role's digest
    #[error("{role} metadata does not match the digest pinned by {pinned_by}")]
    IntegrityMismatch {
        /// The role whose bytes mismatched
        role: RoleName,
        /// The role that pinned the digest
        pinned_by: RoleName,
    },

    /// Signing produced fewer signatures than the role's threshold
    #[error("{role}: produced {produced} signature(s), threshold is {threshold}")]
    InsufficientSignatures {
        /// The role being signed
        role: RoleName,
        /// Signatures actually produced
        produced: usize,
        /// Required threshold
        threshold: u32,
    },

    /// No crypto service available to sign a role
    #[error("no crypto service to sign {0}")]
    NoService(RoleName),

    /// Failure inside a crypto service implementation
    #[error("crypto service error: {0}")]
    Service(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
