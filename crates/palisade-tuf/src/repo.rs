//! The in-memory role tree
//!
//! One `Repo` per collection. Roles are parsed payloads plus an explicit
//! dirty flag; the serialized form of every signed document is cached so
//! snapshot signing can pin the exact bytes a client will fetch.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use palisade_types::{
    FileMeta, Role, RoleKeys, RoleName, RolePayload, Root, Signed, Snapshot, SnapshotFileMeta,
    Targets, Timestamp,
};

use crate::error::{Error, Result};
use crate::keydb::KeyDb;
use crate::service::CryptoService;

/// In-memory signed-role state for one collection
pub struct Repo {
    keydb: KeyDb,
    service: Option<Arc<dyn CryptoService>>,

    root: Option<Root>,
    targets: Option<Targets>,
    snapshot: Option<Snapshot>,
    timestamp: Option<Timestamp>,

    root_dirty: bool,
    targets_dirty: bool,
    snapshot_dirty: bool,

    consistent_snapshot: bool,
    wire: HashMap<RoleName, Vec<u8>>,
}

impl Repo {
    /// Create an engine over a key database
    ///
    /// `service` signs targets and snapshot; root signing always takes an
    /// explicit service because root keys are unlocked per operation.
    pub fn new(keydb: KeyDb, service: Option<Arc<dyn CryptoService>>) -> Self {
        Repo {
            keydb,
            service,
            root: None,
            targets: None,
            snapshot: None,
            timestamp: None,
            root_dirty: false,
            targets_dirty: false,
            snapshot_dirty: false,
            consistent_snapshot: false,
            wire: HashMap::new(),
        }
    }

    /// The key database backing this engine
    pub fn keydb(&self) -> &KeyDb {
        &self.keydb
    }

    /// Seed fresh role payloads from the key database
    ///
    /// Requires role records for all four roles. Every seeded role is
    /// dirty until signed.
    pub fn init_repo(&mut self, consistent_snapshot: bool) -> Result<()> {
        let mut keys = HashMap::new();
        let mut roles = HashMap::new();
        for name in RoleName::ALL {
            let role = self
                .keydb
                .get_role(name)
                .ok_or(Error::MissingRole(name))?;
            for key_id in &role.key_ids {
                let key = self
                    .keydb
                    .get_key(key_id)
                    .ok_or_else(|| Error::UnknownKey {
                        role: name,
                        key_id: key_id.clone(),
                    })?;
                keys.insert(key_id.clone(), key.clone());
            }
            roles.insert(name, RoleKeys::from(role));
        }

        self.root = Some(Root::new(keys, roles, consistent_snapshot));
        self.targets = Some(Targets::new());
        self.snapshot = Some(Snapshot::new());
        self.root_dirty = true;
        self.targets_dirty = true;
        self.snapshot_dirty = true;
        self.consistent_snapshot = consistent_snapshot;
        Ok(())
    }

    /// Current root payload
    pub fn root(&self) -> Option<&Root> {
        self.root.as_ref()
    }

    /// Current targets payload
    pub fn targets(&self) -> Option<&Targets> {
        self.targets.as_ref()
    }

    /// Current snapshot payload
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Current timestamp payload
    pub fn timestamp(&self) -> Option<&Timestamp> {
        self.timestamp.as_ref()
    }

    /// Whether the root role has unsigned changes
    pub fn root_dirty(&self) -> bool {
        self.root_dirty
    }

    /// Whether the targets role has unsigned changes
    pub fn targets_dirty(&self) -> bool {
        self.targets_dirty
    }

    /// Whether the snapshot role has unsigned changes
    pub fn snapshot_dirty(&self) -> bool {
        self.snapshot_dirty
    }

    /// Mark the root role as needing a re-sign
    pub fn mark_root_dirty(&mut self) {
        self.root_dirty = true;
    }

    /// Whether the repository uses consistent-snapshot naming
    pub fn consistent_snapshot(&self) -> bool {
        self.consistent_snapshot
    }

    /// Last serialized signed document of a role
    pub fn wire(&self, role: RoleName) -> Option<&[u8]> {
        self.wire.get(&role).map(|w| w.as_slice())
    }

    /// Install a verified root document
    ///
    /// Rebuilds the key database from the payload; callers must have
    /// verified the document first.
    pub fn set_root(&mut self, signed: &Signed) -> Result<()> {
        let root: Root = signed.parse_payload()?;
        self.keydb = KeyDb::from_root(&root)?;
        self.consistent_snapshot = root.consistent_snapshot;
        self.wire.insert(RoleName::Root, signed.to_wire()?);
        self.root = Some(root);
        self.root_dirty = false;
        Ok(())
    }

    /// Install a verified targets document
    ///
    /// Only the top-level targets role is supported.
    pub fn set_targets(&mut self, role: RoleName, signed: &Signed) -> Result<()> {
        if role != RoleName::Targets {
            return Err(Error::UnknownTargetsRole(role));
        }
        let targets: Targets = signed.parse_payload()?;
        self.wire.insert(RoleName::Targets, signed.to_wire()?);
        self.targets = Some(targets);
        self.targets_dirty = false;
        Ok(())
    }

    /// Install a verified snapshot document
    pub fn set_snapshot(&mut self, signed: &Signed) -> Result<()> {
        let snapshot: Snapshot = signed.parse_payload()?;
        self.wire.insert(RoleName::Snapshot, signed.to_wire()?);
        self.snapshot = Some(snapshot);
        self.snapshot_dirty = false;
        Ok(())
    }

    /// Install a verified timestamp document
    pub fn set_timestamp(&mut self, signed: &Signed) -> Result<()> {
        self.timestamp = Some(signed.parse_payload()?);
        Ok(())
    }

    /// Record a target in the targets role
    pub fn add_target(&mut self, name: &str, meta: FileMeta) -> Result<()> {
        let targets = self
            .targets
            .as_mut()
            .ok_or(Error::NotLoaded(RoleName::Targets))?;
        targets.targets.insert(name.to_string(), meta);
        self.targets_dirty = true;
        self.snapshot_dirty = true;
        Ok(())
    }

    /// Remove a target from the targets role
    ///
    /// Removing an absent target is a no-op but still marks the role
    /// dirty, matching the journal's append-only semantics.
    pub fn remove_target(&mut self, name: &str) -> Result<()> {
        let targets = self
            .targets
            .as_mut()
            .ok_or(Error::NotLoaded(RoleName::Targets))?;
        targets.targets.remove(name);
        self.targets_dirty = true;
        self.snapshot_dirty = true;
        Ok(())
    }

    /// Sign the root role with an explicit service
    ///
    /// Bumps the version, stamps the expiry, and clears the dirty flag.
    pub fn sign_root(
        &mut self,
        expires: DateTime<Utc>,
        service: &dyn CryptoService,
    ) -> Result<Signed> {
        let record = self
            .keydb
            .get_role(RoleName::Root)
            .ok_or(Error::MissingRole(RoleName::Root))?
            .clone();
        let mut root = self
            .root
            .clone()
            .ok_or(Error::NotLoaded(RoleName::Root))?;

        root.prepare_resign(expires);
        let signed = sign_payload(&root, &record, service)?;
        self.wire.insert(RoleName::Root, signed.to_wire()?);
        self.root = Some(root);
        self.root_dirty = false;
        // Snapshot pins the root document, so a fresh root invalidates it.
        self.snapshot_dirty = true;
        Ok(signed)
    }

    /// Sign the targets role
    ///
    /// Uses the engine's own crypto service unless one is supplied.
    pub fn sign_targets(
        &mut self,
        role: RoleName,
        expires: DateTime<Utc>,
        service: Option<&dyn CryptoService>,
    ) -> Result<Signed> {
        if role != RoleName::Targets {
            return Err(Error::UnknownTargetsRole(role));
        }
        let own = self.service.clone();
        let service = service
            .or(own.as_deref())
            .ok_or(Error::NoService(RoleName::Targets))?;

        let record = self
            .keydb
            .get_role(RoleName::Targets)
            .ok_or(Error::MissingRole(RoleName::Targets))?
            .clone();
        let mut targets = self
            .targets
            .clone()
            .ok_or(Error::NotLoaded(RoleName::Targets))?;

        targets.prepare_resign(expires);
        let signed = sign_payload(&targets, &record, service)?;
        self.wire.insert(RoleName::Targets, signed.to_wire()?);
        self.targets = Some(targets);
        self.targets_dirty = false;
        self.snapshot_dirty = true;
        Ok(signed)
    }

    /// Sign the snapshot role
    ///
    /// Refreshes the pinned root and targets descriptions from the
    /// current serialized documents before signing.
    pub fn sign_snapshot(
        &mut self,
        expires: DateTime<Utc>,
        service: Option<&dyn CryptoService>,
    ) -> Result<Signed> {
        let own = self.service.clone();
        let service = service
            .or(own.as_deref())
            .ok_or(Error::NoService(RoleName::Snapshot))?;

        let root_version = self
            .root
            .as_ref()
            .ok_or(Error::NotLoaded(RoleName::Root))?
            .version;
        let targets_version = self
            .targets
            .as_ref()
            .ok_or(Error::NotLoaded(RoleName::Targets))?
            .version;
        let root_wire = self
            .wire
            .get(&RoleName::Root)
            .ok_or(Error::NotLoaded(RoleName::Root))?;
        let targets_wire = self
            .wire
            .get(&RoleName::Targets)
            .ok_or(Error::NotLoaded(RoleName::Targets))?;

        let record = self
            .keydb
            .get_role(RoleName::Snapshot)
            .ok_or(Error::MissingRole(RoleName::Snapshot))?
            .clone();
        let mut snapshot = self
            .snapshot
            .clone()
            .ok_or(Error::NotLoaded(RoleName::Snapshot))?;

        snapshot.meta.insert(
            RoleName::Root.as_str().to_string(),
            SnapshotFileMeta::describe(root_wire, root_version),
        );
        snapshot.meta.insert(
            RoleName::Targets.as_str().to_string(),
            SnapshotFileMeta::describe(targets_wire, targets_version),
        );

        snapshot.prepare_resign(expires);
        let signed = sign_payload(&snapshot, &record, service)?;
        self.wire.insert(RoleName::Snapshot, signed.to_wire()?);
        self.snapshot = Some(snapshot);
        self.snapshot_dirty = false;
        Ok(signed)
    }
}

/// Sign a payload with a role's keys, enforcing the threshold
fn sign_payload<T: RolePayload>(
    payload: &T,
    record: &Role,
    service: &dyn CryptoService,
) -> Result<Signed> {
    let envelope = Signed::from_payload(payload, vec![])?;
    let bytes = envelope.canonical_bytes()?;
    let signatures = service.sign(&record.key_ids, &bytes)?;
    if (signatures.len() as u32) < record.threshold {
        return Err(Error::InsufficientSignatures {
            role: record.name,
            produced: signatures.len(),
            threshold: record.threshold,
        });
    }
    Ok(Signed {
        signatures,
        ..envelope
    })
}
