//! In-memory store for tests and local experimentation
//!
//! Behaves like a remote that has never seen the collection until
//! metadata is pushed, so publish-pipeline scenarios can exercise the
//! first-publish fallback without a server.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use palisade_types::{PublicKey, RoleName};

use crate::error::{Error, Result};
use crate::{MetadataStore, RemoteStore};

/// In-memory metadata and key store
///
/// Cloning shares the underlying maps, so a test can hold one handle
/// while the code under test holds another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meta: Arc<Mutex<HashMap<RoleName, Vec<u8>>>>,
    keys: Arc<Mutex<HashMap<RoleName, PublicKey>>>,
    offline: Arc<Mutex<bool>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a server key for a role
    pub fn set_key(&self, role: RoleName, key: PublicKey) {
        self.keys.lock().unwrap().insert(role, key);
    }

    /// Simulate transport failure on every subsequent operation
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Peek at stored metadata without going through the trait
    pub fn peek_meta(&self, role: RoleName) -> Option<Vec<u8>> {
        self.meta.lock().unwrap().get(&role).cloned()
    }

    /// Number of role documents currently stored
    pub fn meta_count(&self) -> usize {
        self.meta.lock().unwrap().len()
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.lock().unwrap() {
            return Err(Error::RemoteUnavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl MetadataStore for MemoryStore {
    fn get_meta(
        &self,
        role: RoleName,
        max_size: u64,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            self.check_online()?;
            let meta = self.meta.lock().unwrap();
            let data = meta.get(&role).ok_or(Error::MetaNotFound { role })?;
            if data.len() as u64 > max_size {
                return Err(Error::MetaTooLarge { role, max_size });
            }
            Ok(data.clone())
        })
    }

    fn set_meta(
        &self,
        role: RoleName,
        data: &[u8],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        let data = data.to_vec();
        Box::pin(async move {
            self.check_online()?;
            self.meta.lock().unwrap().insert(role, data);
            Ok(())
        })
    }
}

impl RemoteStore for MemoryStore {
    fn get_key(
        &self,
        role: RoleName,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<PublicKey>> + Send + '_>> {
        Box::pin(async move {
            self.check_online()?;
            let keys = self.keys.lock().unwrap();
            keys.get(&role)
                .cloned()
                .ok_or(Error::MetaNotFound { role })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_types::KeyAlgorithm;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_meta(RoleName::Root, 1024).await.unwrap_err(),
            Error::MetaNotFound { .. }
        ));

        store.set_meta(RoleName::Root, b"root-doc").await.unwrap();
        assert_eq!(
            store.get_meta(RoleName::Root, 1024).await.unwrap(),
            b"root-doc"
        );
    }

    #[tokio::test]
    async fn test_memory_store_key_endpoint() {
        let store = MemoryStore::new();
        let key = PublicKey::new(KeyAlgorithm::Ecdsa, vec![1, 2, 3]);
        store.set_key(RoleName::Timestamp, key.clone());

        let fetched = store.get_key(RoleName::Timestamp).await.unwrap();
        assert_eq!(fetched, key);
        assert!(store.get_key(RoleName::Snapshot).await.is_err());
    }

    #[tokio::test]
    async fn test_offline_mode() {
        let store = MemoryStore::new();
        store.set_meta(RoleName::Root, b"doc").await.unwrap();
        store.set_offline(true);
        assert!(matches!(
            store.get_meta(RoleName::Root, 1024).await.unwrap_err(),
            Error::RemoteUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let store = MemoryStore::new();
        store
            .set_meta(RoleName::Root, &vec![b'x'; 64])
            .await
            .unwrap();
        assert!(matches!(
            store.get_meta(RoleName::Root, 63).await.unwrap_err(),
            Error::MetaTooLarge { .. }
        ));
    }
}
