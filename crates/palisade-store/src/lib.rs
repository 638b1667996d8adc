//! Metadata persistence and remote transport
//!
//! This crate defines the two narrow contracts the client core consumes:
//! `MetadataStore` for signed role documents keyed by role name, and
//! `RemoteStore`, which adds the server-key endpoint. Three
//! implementations ship with it: a filesystem store for the local
//! collection directory, an HTTP store speaking the notary-server wire
//! protocol, and an in-memory store for tests.
//!
//! All reads are capped: callers pass the maximum size they are willing
//! to accept, and oversized documents are rejected before they are
//! buffered whole.

pub mod error;
pub mod filesystem;
pub mod http;
pub mod memory;

use std::future::Future;
use std::pin::Pin;

use palisade_types::{PublicKey, RoleName};

pub use error::{Error, Result};
pub use filesystem::FilesystemStore;
pub use http::HttpStore;
pub use memory::MemoryStore;

/// Cap for root metadata fetches (resource-exhaustion defence)
pub const MAX_ROOT_SIZE: u64 = 5 * 1024 * 1024;

/// Cap for targets and snapshot metadata fetches
pub const MAX_META_SIZE: u64 = 50 * 1024 * 1024;

/// Cap for timestamp metadata and key-endpoint fetches
pub const MAX_SMALL_SIZE: u64 = 1024 * 1024;

/// The reasonable cap for fetching a role's metadata
pub fn size_cap(role: RoleName) -> u64 {
    match role {
        RoleName::Root => MAX_ROOT_SIZE,
        RoleName::Targets | RoleName::Snapshot => MAX_META_SIZE,
        RoleName::Timestamp => MAX_SMALL_SIZE,
    }
}

/// Persistence of signed role documents keyed by role name
///
/// Role names are the closed [`RoleName`] set, so implementations never
/// see untrusted path fragments.
pub trait MetadataStore: Send + Sync {
    /// Fetch a role document, rejecting anything larger than `max_size`
    fn get_meta(
        &self,
        role: RoleName,
        max_size: u64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + Send + '_>>;

    /// Store a role document
    fn set_meta(
        &self,
        role: RoleName,
        data: &[u8],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// A metadata store that can also serve the server-held role keys
pub trait RemoteStore: MetadataStore {
    /// Fetch the server's public key for a role (in practice: timestamp)
    fn get_key(
        &self,
        role: RoleName,
    ) -> Pin<Box<dyn Future<Output = Result<PublicKey>> + Send + '_>>;
}
