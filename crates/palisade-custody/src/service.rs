//! Signing capabilities over the key store
//!
//! Two implementations of the engine's `CryptoService` seam live here:
//! [`Signer`], one unlocked key for root operations, and [`KeyService`],
//! a store-backed service that mints and signs with the collection's
//! targets and snapshot keys.

use zeroize::Zeroizing;

use palisade_crypto::KeyPair;
use palisade_tuf::CryptoService;
use palisade_types::{KeyAlgorithm, PublicKey, RoleName, Signature, SignatureMethod};

use crate::error::{Error, Result};
use crate::keystore::KeyFileStore;

/// One unlocked private key with the ids it signs as
///
/// A signer is short-lived: it is created for a single initialize or
/// publish operation and dropped when the operation ends. The key types
/// inside [`KeyPair`] zeroize their secret material on drop.
pub struct Signer {
    key: KeyPair,
    key_ids: Vec<String>,
}

impl Signer {
    /// Wrap a key pair, signing as its own key id
    pub fn new(key: KeyPair) -> Result<Self> {
        let id = key.public_key()?.id();
        Ok(Signer {
            key,
            key_ids: vec![id],
        })
    }

    /// Unlock a stored key, signing as the id it was looked up by
    ///
    /// Looking a key up by a linked external id yields a signer that
    /// attributes its signatures to that external id.
    pub fn unlock(store: &KeyFileStore, id: &str, passphrase: &str) -> Result<Self> {
        let key = store.get_decrypted(id, passphrase)?;
        Ok(Signer {
            key,
            key_ids: vec![id.to_string()],
        })
    }

    /// The primary id this signer signs as
    pub fn key_id(&self) -> &str {
        &self.key_ids[0]
    }

    /// Also sign as `id` (a trust-linked alias of the same key)
    pub fn add_alias(&mut self, id: String) {
        if !self.key_ids.contains(&id) {
            self.key_ids.push(id);
        }
    }

    /// The raw algorithm of the held key
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.key.algorithm()
    }

    /// The held key pair (for certificate minting)
    pub fn key_pair(&self) -> &KeyPair {
        &self.key
    }

    /// The public entry of the held key
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(self.key.public_key()?)
    }
}

impl CryptoService for Signer {
    fn create(
        &self,
        role: RoleName,
        _algorithm: KeyAlgorithm,
    ) -> palisade_tuf::Result<PublicKey> {
        Err(palisade_tuf::Error::Service(format!(
            "a signer holds a single key and cannot mint a {role} key"
        )))
    }

    fn sign(&self, key_ids: &[String], payload: &[u8]) -> palisade_tuf::Result<Vec<Signature>> {
        let mut signatures = Vec::new();
        for id in key_ids {
            if !self.key_ids.contains(id) {
                continue;
            }
            let sig = self
                .key
                .sign(payload)
                .map_err(|e| palisade_tuf::Error::Service(e.to_string()))?;
            signatures.push(Signature::new(
                id.clone(),
                SignatureMethod::for_algorithm(self.key.algorithm()),
                sig,
            ));
        }
        Ok(signatures)
    }
}

/// Store-backed crypto service for the collection's non-root keys
///
/// Minted keys are encrypted under the service's passphrase (empty for
/// the default local store, as targets and snapshot keys are protected
/// by directory permissions rather than a prompt). Keys are decrypted
/// per signing call and released immediately after.
pub struct KeyService {
    store: KeyFileStore,
    passphrase: Zeroizing<String>,
}

impl KeyService {
    /// Create a service over a key store
    pub fn new(store: KeyFileStore, passphrase: &str) -> Self {
        KeyService {
            store,
            passphrase: Zeroizing::new(passphrase.to_string()),
        }
    }

    /// The underlying key store
    pub fn store(&self) -> &KeyFileStore {
        &self.store
    }
}

impl CryptoService for KeyService {
    fn create(&self, role: RoleName, algorithm: KeyAlgorithm) -> palisade_tuf::Result<PublicKey> {
        let inner = || -> Result<PublicKey> {
            let key = KeyPair::generate(algorithm)?;
            let public = key.public_key()?;
            self.store
                .add_encrypted(&public.id(), &key, &self.passphrase)?;
            tracing::debug!(role = %role, id = %public.id(), "minted {algorithm} key");
            Ok(public)
        };
        inner().map_err(|e| palisade_tuf::Error::Service(e.to_string()))
    }

    fn sign(&self, key_ids: &[String], payload: &[u8]) -> palisade_tuf::Result<Vec<Signature>> {
        let mut signatures = Vec::new();
        for id in key_ids {
            let key = match self.store.get_decrypted(id, &self.passphrase) {
                Ok(key) => key,
                // Not holding a listed key is normal (e.g. the root key
                // lives in another store); the threshold check upstream
                // decides whether enough signatures were produced.
                Err(Error::KeyNotFound(_)) => continue,
                Err(e) => return Err(palisade_tuf::Error::Service(e.to_string())),
            };
            let sig = key
                .sign(payload)
                .map_err(|e| palisade_tuf::Error::Service(e.to_string()))?;
            signatures.push(Signature::new(
                id.clone(),
                SignatureMethod::for_algorithm(key.algorithm()),
                sig,
            ));
        }
        Ok(signatures)
    }
}
