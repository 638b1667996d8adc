//! TUF metadata model for palisade
//!
//! This crate provides the data structures shared across the palisade
//! workspace: role names and records, public-key entries with deterministic
//! identifiers, signed metadata envelopes, role payloads, and target file
//! metadata. Serialization matches the notary-server wire format; hashing
//! and key identity are computed over canonical JSON.

pub mod encoding;
pub mod error;
pub mod keys;
pub mod meta;
pub mod metadata;
pub mod role;
pub mod signed;

pub use encoding::{base64_bytes, HexBytes};
pub use error::{Error, Result};
pub use keys::{KeyAlgorithm, PublicKey, Signature, SignatureMethod};
pub use meta::{FileMeta, Hashes, SnapshotFileMeta, SHA256_DIGEST_LEN};
pub use metadata::{RoleKeys, RolePayload, Root, Snapshot, Targets, Timestamp};
pub use role::{default_expires, Role, RoleName};
pub use signed::{to_canonical_json, Signed};
