//! The signing seam between the engine and key custody

use palisade_types::{KeyAlgorithm, PublicKey, RoleName, Signature};

use crate::error::Result;

/// A source of keys and signatures for role documents
///
/// The engine never holds private material. When a role needs signing it
/// hands the canonical payload bytes and the role's key ids to a
/// service; the service signs with whichever of those keys it custodies
/// and returns one signature per key it could use. Implementations
/// decide how keys are stored, unlocked, and released.
pub trait CryptoService: Send + Sync {
    /// Mint a new key for a role, returning its public entry
    fn create(&self, role: RoleName, algorithm: KeyAlgorithm) -> Result<PublicKey>;

    /// Sign a payload with every listed key the service holds
    ///
    /// Returns an empty vector when none of the key ids are available;
    /// the engine turns that into a threshold failure.
    fn sign(&self, key_ids: &[String], payload: &[u8]) -> Result<Vec<Signature>>;
}
