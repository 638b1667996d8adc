//! The per-GUN trust collection
//!
//! A `Collection` owns everything needed to operate on one named trust
//! collection: the filtered certificate stores, the encrypted key store,
//! the local metadata store, the remote transport, and (once
//! established) the in-memory TUF engine. Operations are linear and
//! blocking end to end; two collections over the same base directory
//! must not be used concurrently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};

use palisade_crypto::{leaf_from_bundle, mint_certificate, parse_certificate, KeyPair};
use palisade_custody::{KeyFileStore, KeyService, Signer};
use palisade_store::{
    FilesystemStore, HttpStore, MetadataStore, RemoteStore, MAX_ROOT_SIZE,
};
use palisade_truststore::CertificateStore;
use palisade_tuf::{verify_root, Client as TufClient, CryptoService as _, KeyDb, Repo};
use palisade_types::{
    default_expires, FileMeta, KeyAlgorithm, PublicKey, Role, RoleName, Signed,
};

use crate::changelist::{Action, Change, FileChangelist, TYPE_TARGET};
use crate::error::{Error, ErrorKind, Result};
use crate::target::Target;

/// Trust directory under the base directory
pub const TRUST_DIR: &str = "trusted_certificates";

/// Key directory under the base directory
pub const KEYS_DIR: &str = "private_keys";

/// TUF state directory under the base directory
pub const TUF_DIR: &str = "tuf";

/// Default near-expiry safety window for the root role
fn default_safety_window() -> Duration {
    Duration::days(7)
}

/// Configuration for a [`Collection`]
pub struct CollectionBuilder {
    gun: String,
    base_dir: PathBuf,
    base_url: Option<String>,
    remote: Option<Arc<dyn RemoteStore>>,
    http_client: Option<reqwest::Client>,
    safety_window: Duration,
    local_passphrase: String,
}

impl CollectionBuilder {
    /// Start building a collection for a GUN under a base directory
    pub fn new(gun: impl Into<String>, base_dir: impl AsRef<Path>) -> Self {
        CollectionBuilder {
            gun: gun.into(),
            base_dir: base_dir.as_ref().to_path_buf(),
            base_url: None,
            remote: None,
            http_client: None,
            safety_window: default_safety_window(),
            local_passphrase: String::new(),
        }
    }

    /// Base URL of the remote notary server
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use a pre-built remote store instead of the HTTP transport
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Supply the HTTP client (timeouts, proxies) for the transport
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// How close to root expiry a publish forces a re-sign
    pub fn root_safety_window(mut self, window: Duration) -> Self {
        self.safety_window = window;
        self
    }

    /// Passphrase protecting the locally minted targets/snapshot keys
    pub fn local_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.local_passphrase = passphrase.into();
        self
    }

    /// Assemble the collection, creating its directories as needed
    pub fn build(self) -> Result<Collection> {
        let trust_dir = self.base_dir.join(TRUST_DIR);
        let ca_store = CertificateStore::ca_store(&trust_dir)?;
        let cert_store = CertificateStore::leaf_store(&trust_dir)?;

        let key_store = KeyFileStore::new(self.base_dir.join(KEYS_DIR))?;
        let key_service = Arc::new(KeyService::new(
            key_store.clone(),
            &self.local_passphrase,
        ));

        let tuf_repo_path = self.base_dir.join(TUF_DIR).join(&self.gun);
        std::fs::create_dir_all(&tuf_repo_path)?;
        let file_store = FilesystemStore::new(&tuf_repo_path);

        let remote: Arc<dyn RemoteStore> = match (self.remote, self.base_url) {
            (Some(remote), _) => remote,
            (None, Some(url)) => {
                let store = match self.http_client {
                    Some(client) => HttpStore::with_client(&url, &self.gun, client)?,
                    None => HttpStore::new(&url, &self.gun)?,
                };
                Arc::new(store)
            }
            (None, None) => {
                return Err(Error::Store(palisade_store::Error::RemoteUnavailable(
                    "no remote store or base URL configured".to_string(),
                )));
            }
        };

        Ok(Collection {
            gun: self.gun,
            base_dir: self.base_dir,
            tuf_repo_path,
            ca_store,
            cert_store,
            key_store,
            key_service,
            file_store,
            remote,
            repo: None,
            safety_window: self.safety_window,
        })
    }
}

/// Everything needed to operate on one trust collection
pub struct Collection {
    gun: String,
    base_dir: PathBuf,
    tuf_repo_path: PathBuf,
    ca_store: CertificateStore,
    cert_store: CertificateStore,
    key_store: KeyFileStore,
    key_service: Arc<KeyService>,
    file_store: FilesystemStore,
    remote: Arc<dyn RemoteStore>,
    repo: Option<Repo>,
    safety_window: Duration,
}

impl Collection {
    /// Start a builder for a collection
    pub fn builder(gun: impl Into<String>, base_dir: impl AsRef<Path>) -> CollectionBuilder {
        CollectionBuilder::new(gun, base_dir)
    }

    /// Create a collection talking HTTP to a notary server
    ///
    /// Directories under `base_dir` are created as needed.
    pub fn new(base_dir: impl AsRef<Path>, gun: &str, base_url: &str) -> Result<Self> {
        Self::builder(gun, base_dir).base_url(base_url).build()
    }

    /// Open an existing collection; the base directory must exist
    pub fn open(base_dir: impl AsRef<Path>, gun: &str, base_url: &str) -> Result<Self> {
        if !base_dir.as_ref().is_dir() {
            return Err(Error::RepoNotExist);
        }
        Self::new(base_dir, gun, base_url)
    }

    /// The collection's GUN
    pub fn gun(&self) -> &str {
        &self.gun
    }

    /// The collection's base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn changelist_dir(&self) -> PathBuf {
        self.tuf_repo_path.join("changelist")
    }

    /// Mint a new root key into custody, returning its id
    ///
    /// Only the raw `RSA` (4096-bit) and `ECDSA` (P-256) algorithms are
    /// accepted.
    pub fn gen_root_key(&self, algorithm: KeyAlgorithm, passphrase: &str) -> Result<String> {
        if !matches!(algorithm, KeyAlgorithm::Rsa | KeyAlgorithm::Ecdsa) {
            return Err(Error::InvalidKeyAlgorithm(algorithm.to_string()));
        }
        let key = KeyPair::generate(algorithm)?;
        let id = key.public_key()?.id();
        self.key_store.add_encrypted(&id, &key, passphrase)?;
        Ok(id)
    }

    /// Unlock a root key as a [`Signer`]
    pub fn root_signer(&self, key_id: &str, passphrase: &str) -> Result<Signer> {
        Ok(Signer::unlock(&self.key_store, key_id, passphrase)?)
    }

    /// First-time initialization of the collection
    ///
    /// Mints the root certificate, links it to the signing key, fetches
    /// the server's timestamp key, mints targets and snapshot keys, and
    /// signs and persists the initial metadata. Metadata writes happen
    /// last, so a failure part-way leaves no initialized state behind.
    pub async fn initialize(&mut self, signer: &mut Signer) -> Result<()> {
        // Self-signed certificate over the root key, CN = GUN.
        let minted = mint_certificate(signer.key_pair(), &self.gun)?;
        let cert_info = parse_certificate(&minted.der)?;
        self.cert_store.add_cert(cert_info)?;

        // The root key enters the metadata X.509-encoded, tying root.json
        // to the certificate PKI. Verifiers need the tag to know how to
        // decode it.
        let entry_algorithm = match signer.algorithm() {
            KeyAlgorithm::Rsa => KeyAlgorithm::RsaX509,
            KeyAlgorithm::Ecdsa => KeyAlgorithm::EcdsaX509,
            other => return Err(Error::InvalidKeyAlgorithm(other.to_string())),
        };
        let root_key = PublicKey::new(entry_algorithm, minted.pem.clone().into_bytes());
        let root_key_id = root_key.id();

        // The certificate-derived id must be able to find the private
        // key after this operation ends.
        tracing::debug!("linking {} to {}", root_key_id, signer.key_id());
        self.key_store.link(&root_key_id, signer.key_id())?;
        signer.add_alias(root_key_id.clone());

        // The timestamp key pair never leaves the server.
        let timestamp_key = self.remote.get_key(RoleName::Timestamp).await?;
        tracing::debug!(
            "got remote {} timestamp key with id {}",
            timestamp_key.algorithm,
            timestamp_key.id()
        );

        // Targets and snapshot keys are always minted locally, always
        // ECDSA.
        let targets_key = self
            .key_service
            .create(RoleName::Targets, KeyAlgorithm::Ecdsa)?;
        let snapshot_key = self
            .key_service
            .create(RoleName::Snapshot, KeyAlgorithm::Ecdsa)?;

        let mut keydb = KeyDb::new();
        let root_id = keydb.add_key(root_key);
        let targets_id = keydb.add_key(targets_key);
        let snapshot_id = keydb.add_key(snapshot_key);
        let timestamp_id = keydb.add_key(timestamp_key);
        keydb.add_role(Role::new(RoleName::Root, 1, vec![root_id])?)?;
        keydb.add_role(Role::new(RoleName::Targets, 1, vec![targets_id])?)?;
        keydb.add_role(Role::new(RoleName::Snapshot, 1, vec![snapshot_id])?)?;
        keydb.add_role(Role::new(RoleName::Timestamp, 1, vec![timestamp_id])?)?;

        let mut repo = Repo::new(keydb, Some(self.key_service.clone()));
        repo.init_repo(false)?;

        // Sign everything before persisting anything.
        let signed_root = repo.sign_root(default_expires(RoleName::Root), signer)?;
        let signed_targets =
            repo.sign_targets(RoleName::Targets, default_expires(RoleName::Targets), None)?;
        let signed_snapshot = repo.sign_snapshot(default_expires(RoleName::Snapshot), None)?;

        let root_wire = signed_root.to_wire()?;
        let targets_wire = signed_targets.to_wire()?;
        let snapshot_wire = signed_snapshot.to_wire()?;

        self.file_store.set_meta(RoleName::Root, &root_wire).await?;
        self.file_store
            .set_meta(RoleName::Targets, &targets_wire)
            .await?;
        self.file_store
            .set_meta(RoleName::Snapshot, &snapshot_wire)
            .await?;

        self.repo = Some(repo);
        tracing::info!(gun = %self.gun, "initialized trust collection");
        Ok(())
    }

    /// Journal a target for the next publish
    pub fn add_target(&self, target: &Target) -> Result<()> {
        let meta = target.to_meta();
        meta.require_sha256(&target.name)?;

        tracing::info!(
            "adding target \"{}\" with sha256 {} and size {} bytes",
            target.name,
            target.sha256_hex().unwrap_or_default(),
            target.length
        );

        let content = serde_json::to_vec(&meta)
            .map_err(|e| Error::ChangelistCorrupt(e.to_string()))?;
        let change = Change::new(
            Action::Create,
            RoleName::Targets,
            TYPE_TARGET,
            target.name.clone(),
            content,
        );

        let mut changelist = FileChangelist::open(self.changelist_dir())?;
        changelist.add(&change)?;
        changelist.close();
        Ok(())
    }

    /// All targets in the current signed targets role
    ///
    /// Bootstraps from the remote and pulls fresh metadata first.
    pub async fn list_targets(&mut self) -> Result<Vec<Target>> {
        let client = self.bootstrap_client().await?;
        let repo = self.repo.as_mut().expect("bootstrap installed a repo");
        client.update(repo).await?;

        let targets = repo
            .targets()
            .ok_or(Error::Engine(palisade_tuf::Error::NotLoaded(
                RoleName::Targets,
            )))?;
        Ok(targets
            .targets
            .iter()
            .map(|(name, meta)| Target::from_meta(name, meta))
            .collect())
    }

    /// A single target by name; absent targets are an error
    pub async fn get_target_by_name(&mut self, name: &str) -> Result<Target> {
        let targets = self.list_targets().await?;
        targets
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::TargetNotFound(name.to_string()))
    }

    /// Push local changes to the remote server
    ///
    /// On success the remote holds a consistent root (if updated),
    /// targets, and snapshot, and the changelist is empty. On failure
    /// the changelist is intact and replayable. Uploads are best-effort
    /// in the order root, targets, snapshot; a failure between uploads
    /// leaves the remote transiently inconsistent until the next
    /// publish.
    pub async fn publish<F>(&mut self, get_passphrase: F) -> Result<()>
    where
        F: Fn() -> Result<String>,
    {
        let mut update_root = false;
        let mut root_wire: Option<Vec<u8>> = None;

        // Establish an engine: remote bootstrap first, local fallback
        // when the server has never seen this collection.
        match self.bootstrap_client().await {
            Ok(client) => {
                let repo = self.repo.as_mut().expect("bootstrap installed a repo");
                client.update(repo).await?;
            }
            Err(e) if e.kind() == ErrorKind::MetaNotFound => {
                tracing::debug!("remote has no metadata for this collection, loading local state");
                if self.bootstrap_repo().await.is_err() {
                    tracing::debug!("repository not initialized during publish");
                    return Err(Error::RepoNotInitialized);
                }
                // The server must receive the initial root document.
                update_root = true;
                root_wire = self
                    .repo
                    .as_ref()
                    .and_then(|r| r.wire(RoleName::Root))
                    .map(|w| w.to_vec());
            }
            Err(e) => {
                tracing::error!("could not publish repository: {e}");
                return Err(e);
            }
        }

        // Apply pending changes before any signing.
        let mut changelist = FileChangelist::open(self.changelist_dir())?;
        {
            let repo = self.repo.as_mut().expect("repo established above");
            apply_changelist(repo, &changelist)?;
        }

        // Conditional root re-sign: dirty or close to expiry.
        let needs_root_resign = {
            let repo = self.repo.as_ref().expect("repo established above");
            repo.root_dirty() || root_near_expiry(repo, self.safety_window)
        };
        if needs_root_resign {
            let root_key_id = {
                let repo = self.repo.as_ref().expect("repo established above");
                let root = repo.root().ok_or(Error::RepoNotInitialized)?;
                root.role_keys(RoleName::Root)
                    .and_then(|keys| keys.key_ids.first().cloned())
                    .ok_or_else(|| {
                        Error::RootValidationFailed("root payload lists no root keys".to_string())
                    })?
            };
            let passphrase = get_passphrase()?;
            let signer = Signer::unlock(&self.key_store, &root_key_id, &passphrase)?;

            let repo = self.repo.as_mut().expect("repo established above");
            let signed = repo.sign_root(default_expires(RoleName::Root), &signer)?;
            tracing::debug!(
                version = repo.root().map(|r| r.version).unwrap_or_default(),
                "re-signed root"
            );
            root_wire = Some(signed.to_wire()?);
            update_root = true;
        }

        // Targets and snapshot are re-signed on every publish so the
        // server-side timestamp stays consistent.
        let (targets_wire, snapshot_wire) = {
            let repo = self.repo.as_mut().expect("repo established above");
            let targets =
                repo.sign_targets(RoleName::Targets, default_expires(RoleName::Targets), None)?;
            let snapshot =
                repo.sign_snapshot(default_expires(RoleName::Snapshot), None)?;
            // Marshal everything locally before the first upload; an
            // encoding failure must not leave a partial remote update.
            (targets.to_wire()?, snapshot.to_wire()?)
        };

        if update_root {
            let wire = root_wire.ok_or_else(|| {
                Error::RootValidationFailed("no root document available to upload".to_string())
            })?;
            self.remote.set_meta(RoleName::Root, &wire).await?;
        }
        self.remote
            .set_meta(RoleName::Targets, &targets_wire)
            .await?;
        self.remote
            .set_meta(RoleName::Snapshot, &snapshot_wire)
            .await?;

        // Every observed change is now part of the signed targets role.
        changelist.clear()?;
        tracing::info!(gun = %self.gun, "published collection");
        Ok(())
    }

    /// Fetch and validate the remote root, returning a pull client
    ///
    /// The engine is replaced with a fresh one seeded from the verified
    /// root.
    pub async fn bootstrap_client(&mut self) -> Result<TufClient> {
        let root_raw = self.remote.get_meta(RoleName::Root, MAX_ROOT_SIZE).await?;
        let signed = Signed::from_wire(&root_raw)?;

        let trusted = self.validate_root(&signed)?;
        verify_root(&signed, 0, &trusted, 1)
            .map_err(|e| Error::RootValidationFailed(e.to_string()))?;

        let mut repo = Repo::new(KeyDb::new(), Some(self.key_service.clone()));
        repo.set_root(&signed)?;
        self.repo = Some(repo);

        Ok(TufClient::new(self.remote.clone()))
    }

    /// Seed the engine from local metadata without remote contact
    ///
    /// Local material is trusted because this user produced it.
    pub async fn bootstrap_repo(&mut self) -> Result<()> {
        tracing::debug!("loading trusted collection from disk");
        let mut repo = Repo::new(KeyDb::new(), Some(self.key_service.clone()));

        let raw = self.file_store.get_meta(RoleName::Root, MAX_ROOT_SIZE).await?;
        repo.set_root(&Signed::from_wire(&raw)?)?;

        let raw = self
            .file_store
            .get_meta(RoleName::Targets, palisade_store::size_cap(RoleName::Targets))
            .await?;
        repo.set_targets(RoleName::Targets, &Signed::from_wire(&raw)?)?;

        let raw = self
            .file_store
            .get_meta(RoleName::Snapshot, palisade_store::size_cap(RoleName::Snapshot))
            .await?;
        repo.set_snapshot(&Signed::from_wire(&raw)?)?;

        self.repo = Some(repo);
        Ok(())
    }

    /// Build the trusted key set for a downloaded root document
    ///
    /// A listed root key is trusted iff its leaf certificate matches the
    /// leaf store exactly (with CN = GUN) or chains to a CA anchor for
    /// this GUN. An empty result is [`Error::NoTrustedRoot`].
    fn validate_root(&self, signed: &Signed) -> Result<HashMap<String, PublicKey>> {
        let payload: palisade_types::Root = signed.parse_payload()?;
        let role = payload
            .role_keys(RoleName::Root)
            .ok_or(Error::NoTrustedRoot)?;

        let mut trusted = HashMap::new();
        for key_id in &role.key_ids {
            let Some(entry) = payload.keys.get(key_id) else {
                tracing::debug!(key_id = %key_id, "root role lists a key the document does not carry");
                continue;
            };

            // The public entry is a PEM certificate bundle; the leaf is
            // the first non-CA certificate.
            let leaf = match leaf_from_bundle(entry.public_bytes()) {
                Ok(leaf) => leaf,
                Err(e) => {
                    tracing::debug!(key_id = %key_id, "could not parse root certificate: {e}");
                    continue;
                }
            };

            let exact_match = self.cert_store.get_by_fingerprint(&leaf.fingerprint).is_ok()
                && leaf.common_name.as_deref() == Some(self.gun.as_str());

            let chains_to_anchor = self
                .ca_store
                .verify_chain(std::slice::from_ref(&leaf), &self.gun)
                .is_ok();

            if exact_match || chains_to_anchor {
                trusted.insert(key_id.clone(), entry.clone());
            }
        }

        if trusted.is_empty() {
            return Err(Error::NoTrustedRoot);
        }
        Ok(trusted)
    }
}

/// Whether the root role is within the safety window of its expiry
fn root_near_expiry(repo: &Repo, window: Duration) -> bool {
    match repo.root() {
        Some(root) => Utc::now() + window > root.expires,
        None => false,
    }
}

/// Apply journaled changes to the engine in insertion order
///
/// Only target changes against the targets role are meaningful; anything
/// else corrupts the journal's contract and aborts before signing.
fn apply_changelist(repo: &mut Repo, changelist: &FileChangelist) -> Result<()> {
    let mut applied = 0usize;
    for change in changelist.iter()? {
        let change = change?;
        if change.scope != RoleName::Targets {
            return Err(Error::ChangelistCorrupt(format!(
                "cannot apply changes to role {}",
                change.scope
            )));
        }
        if change.kind != TYPE_TARGET {
            return Err(Error::ChangelistCorrupt(format!(
                "unsupported change type {}",
                change.kind
            )));
        }
        match change.action {
            Action::Create | Action::Update => {
                let meta: FileMeta = serde_json::from_slice(&change.content)
                    .map_err(|e| Error::ChangelistCorrupt(format!("{}: {e}", change.path)))?;
                repo.add_target(&change.path, meta)?;
            }
            Action::Delete => {
                repo.remove_target(&change.path)?;
            }
        }
        applied += 1;
    }
    if applied > 0 {
        tracing::debug!(applied, "applied changelist");
    }
    Ok(())
}
