//! Pull client: fetch and verify non-root roles from a remote
//!
//! Bootstrap installs a verified root; this client walks the remaining
//! chain in trust order. Timestamp is verified against the key database,
//! snapshot against the digest the timestamp pins, and targets against
//! the digest the snapshot pins. Version floors never move backwards.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use palisade_store::{size_cap, MetadataStore as _, RemoteStore};
use palisade_types::{RoleName, Signed, SnapshotFileMeta};

use crate::error::{Error, Result};
use crate::repo::Repo;
use crate::verify::verify_role;

/// Pull client bound to one remote store
pub struct Client {
    remote: Arc<dyn RemoteStore>,
}

impl Client {
    /// Create a client over a remote store
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// The remote this client pulls from
    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    /// Fetch and verify timestamp, snapshot, and targets into the repo
    pub async fn update(&self, repo: &mut Repo) -> Result<()> {
        // Timestamp: freshness, signed by the server's timestamp key.
        let raw = self
            .remote
            .get_meta(RoleName::Timestamp, size_cap(RoleName::Timestamp))
            .await?;
        let signed = Signed::from_wire(&raw)?;
        let floor = repo.timestamp().map(|t| t.version).unwrap_or(0);
        verify_role(&signed, RoleName::Timestamp, repo.keydb(), floor)?;
        repo.set_timestamp(&signed)?;
        let timestamp = repo.timestamp().expect("just installed").clone();

        // Snapshot, checked against the digest the timestamp pins.
        let raw = self
            .remote
            .get_meta(RoleName::Snapshot, size_cap(RoleName::Snapshot))
            .await?;
        let mut floor = repo.snapshot().map(|s| s.version).unwrap_or(0);
        if let Some(pin) = timestamp.meta.get(RoleName::Snapshot.as_str()) {
            check_pin(pin, &raw, RoleName::Snapshot, RoleName::Timestamp)?;
            floor = floor.max(pin.version);
        }
        let signed = Signed::from_wire(&raw)?;
        verify_role(&signed, RoleName::Snapshot, repo.keydb(), floor)?;
        repo.set_snapshot(&signed)?;
        let snapshot = repo.snapshot().expect("just installed").clone();

        // Targets, checked against the digest the snapshot pins.
        let raw = self
            .remote
            .get_meta(RoleName::Targets, size_cap(RoleName::Targets))
            .await?;
        let mut floor = repo.targets().map(|t| t.version).unwrap_or(0);
        if let Some(pin) = snapshot.meta.get(RoleName::Targets.as_str()) {
            check_pin(pin, &raw, RoleName::Targets, RoleName::Snapshot)?;
            floor = floor.max(pin.version);
        }
        let signed = Signed::from_wire(&raw)?;
        verify_role(&signed, RoleName::Targets, repo.keydb(), floor)?;
        repo.set_targets(RoleName::Targets, &signed)?;

        tracing::debug!("pulled and verified timestamp, snapshot, and targets");
        Ok(())
    }
}

/// Check fetched bytes against the length and sha256 a parent role pinned
fn check_pin(
    pin: &SnapshotFileMeta,
    raw: &[u8],
    role: RoleName,
    pinned_by: RoleName,
) -> Result<()> {
    if pin.length != raw.len() as u64 {
        return Err(Error::IntegrityMismatch { role, pinned_by });
    }
    if let Some(expected) = pin.hashes.get("sha256") {
        if Sha256::digest(raw).as_slice() != expected.as_slice() {
            return Err(Error::IntegrityMismatch { role, pinned_by });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keydb::KeyDb;
    use crate::service::CryptoService;
    use palisade_crypto::KeyPair;
    use palisade_store::{MemoryStore, MetadataStore};
    use palisade_types::{
        default_expires, KeyAlgorithm, PublicKey, Role, RolePayload, Signature, SignatureMethod,
        Timestamp,
    };
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    struct TestService {
        keys: Mutex<HashMap<String, Arc<KeyPair>>>,
    }

    impl TestService {
        fn new() -> Self {
            Self {
                keys: Mutex::new(HashMap::new()),
            }
        }
    }

    impl CryptoService for TestService {
        fn create(&self, _role: RoleName, algorithm: KeyAlgorithm) -> Result<PublicKey> {
            let kp = KeyPair::generate(algorithm).map_err(|e| Error::Service(e.to_string()))?;
            let public = kp.public_key().map_err(|e| Error::Service(e.to_string()))?;
            self.keys
                .lock()
                .unwrap()
                .insert(public.id(), Arc::new(kp));
            Ok(public)
        }

        fn sign(&self, key_ids: &[String], payload: &[u8]) -> Result<Vec<Signature>> {
            let keys = self.keys.lock().unwrap();
            let mut sigs = Vec::new();
            for id in key_ids {
                if let Some(kp) = keys.get(id) {
                    let sig = kp
                        .sign(payload)
                        .map_err(|e| Error::Service(e.to_string()))?;
                    sigs.push(Signature::new(
                        id.clone(),
                        SignatureMethod::for_algorithm(kp.algorithm()),
                        sig,
                    ));
                }
            }
            Ok(sigs)
        }
    }

    /// Build a published collection in a MemoryStore and a fresh repo
    /// that trusts its keys.
    async fn published_collection() -> (MemoryStore, Repo, Arc<TestService>) {
        let service = Arc::new(TestService::new());
        let mut keydb = KeyDb::new();
        let mut role_ids = Vec::new();
        for role in RoleName::ALL {
            let public = service.create(role, KeyAlgorithm::Ecdsa).unwrap();
            role_ids.push((role, keydb.add_key(public)));
        }
        let ts_key_id = role_ids
            .iter()
            .find(|(r, _)| *r == RoleName::Timestamp)
            .unwrap()
            .1
            .clone();
        for (role, id) in role_ids {
            keydb
                .add_role(Role::new(role, 1, vec![id]).unwrap())
                .unwrap();
        }

        let mut repo = Repo::new(keydb, Some(service.clone()));
        repo.init_repo(false).unwrap();

        let root = repo
            .sign_root(default_expires(RoleName::Root), service.as_ref())
            .unwrap();
        let targets = repo
            .sign_targets(RoleName::Targets, default_expires(RoleName::Targets), None)
            .unwrap();
        let snapshot = repo
            .sign_snapshot(default_expires(RoleName::Snapshot), None)
            .unwrap();

        // Server-side timestamp pinning the snapshot document.
        let snapshot_wire = snapshot.to_wire().unwrap();
        let mut meta = BTreeMap::new();
        meta.insert(
            RoleName::Snapshot.as_str().to_string(),
            SnapshotFileMeta::describe(&snapshot_wire, 1),
        );
        let mut ts_payload = Timestamp {
            type_name: RoleName::Timestamp.as_str().to_string(),
            version: 0,
            expires: default_expires(RoleName::Timestamp),
            meta,
        };
        ts_payload.prepare_resign(default_expires(RoleName::Timestamp));
        let envelope = Signed::from_payload(&ts_payload, vec![]).unwrap();
        let sigs = service
            .sign(&[ts_key_id], &envelope.canonical_bytes().unwrap())
            .unwrap();
        let ts_signed = Signed {
            signatures: sigs,
            ..envelope
        };

        let remote = MemoryStore::new();
        remote
            .set_meta(RoleName::Root, &root.to_wire().unwrap())
            .await
            .unwrap();
        remote
            .set_meta(RoleName::Targets, &targets.to_wire().unwrap())
            .await
            .unwrap();
        remote
            .set_meta(RoleName::Snapshot, &snapshot_wire)
            .await
            .unwrap();
        remote
            .set_meta(RoleName::Timestamp, &ts_signed.to_wire().unwrap())
            .await
            .unwrap();

        // A fresh repo that trusts the same root.
        let mut fresh = Repo::new(KeyDb::new(), Some(service.clone()));
        fresh.set_root(&root).unwrap();
        (remote, fresh, service)
    }

    #[tokio::test]
    async fn test_update_pulls_and_verifies_chain() {
        let (remote, mut repo, _service) = published_collection().await;
        let client = Client::new(Arc::new(remote));
        client.update(&mut repo).await.unwrap();

        assert_eq!(repo.targets().unwrap().version, 1);
        assert_eq!(repo.snapshot().unwrap().version, 1);
        assert_eq!(repo.timestamp().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_update_rejects_tampered_snapshot() {
        let (remote, mut repo, _service) = published_collection().await;

        // Corrupt the stored snapshot; the timestamp pin must catch it.
        let mut snapshot = remote.peek_meta(RoleName::Snapshot).unwrap();
        let last = snapshot.len() - 1;
        snapshot[last] ^= 0x01;
        remote
            .set_meta(RoleName::Snapshot, &snapshot)
            .await
            .unwrap();

        let client = Client::new(Arc::new(remote));
        let err = client.update(&mut repo).await.unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch { .. }));
    }

    #[tokio::test]
    async fn test_update_propagates_missing_metadata() {
        let (_remote, mut repo, _service) = published_collection().await;
        // An empty remote is missing its timestamp; update fails on the
        // first fetch.
        let client = Client::new(Arc::new(MemoryStore::new()));
        let err = client.update(&mut repo).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store(palisade_store::Error::MetaNotFound { .. })
        ));
    }
}
