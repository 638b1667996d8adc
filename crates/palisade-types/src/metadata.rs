//! Role payloads: root, targets, snapshot, timestamp
//!
//! Versions start at zero when a payload is first built and are bumped by
//! `prepare_resign` before every signing pass, so the first signed
//! document of any role carries version 1.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::keys::PublicKey;
use crate::meta::{FileMeta, SnapshotFileMeta};
use crate::role::{Role, RoleName};

/// Common surface of the four role payloads
pub trait RolePayload: Serialize + DeserializeOwned {
    /// The role this payload belongs to
    const ROLE: RoleName;

    /// Current version
    fn version(&self) -> u64;

    /// Current expiry
    fn expires(&self) -> DateTime<Utc>;

    /// Advance the version and stamp a fresh expiry before signing
    fn prepare_resign(&mut self, expires: DateTime<Utc>);
}

/// Key-set record for one role inside the root payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    /// Key ids trusted for the role
    #[serde(rename = "keyids")]
    pub key_ids: Vec<String>,
    /// Minimum number of distinct valid signatures
    pub threshold: u32,
}

impl From<&Role> for RoleKeys {
    fn from(role: &Role) -> Self {
        RoleKeys {
            key_ids: role.key_ids.clone(),
            threshold: role.threshold,
        }
    }
}

/// The root payload: the trust anchor tying keys to roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Root {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    /// All keys referenced by any role, by key id
    pub keys: HashMap<String, PublicKey>,
    /// Key-set records per role
    pub roles: HashMap<RoleName, RoleKeys>,
    /// Whether the repository uses consistent-snapshot naming
    pub consistent_snapshot: bool,
}

impl Root {
    /// Build an unsigned root payload at version zero
    pub fn new(
        keys: HashMap<String, PublicKey>,
        roles: HashMap<RoleName, RoleKeys>,
        consistent_snapshot: bool,
    ) -> Self {
        Root {
            type_name: RoleName::Root.as_str().to_string(),
            version: 0,
            expires: Utc::now(),
            keys,
            roles,
            consistent_snapshot,
        }
    }

    /// Key-set record for a role, if present
    pub fn role_keys(&self, role: RoleName) -> Option<&RoleKeys> {
        self.roles.get(&role)
    }
}

impl RolePayload for Root {
    const ROLE: RoleName = RoleName::Root;

    fn version(&self) -> u64 {
        self.version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn prepare_resign(&mut self, expires: DateTime<Utc>) {
        self.version += 1;
        self.expires = expires;
    }
}

/// The targets payload: published names with their file metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    /// Target name to file metadata
    pub targets: BTreeMap<String, FileMeta>,
}

impl Targets {
    /// Build an empty unsigned targets payload at version zero
    pub fn new() -> Self {
        Targets {
            type_name: RoleName::Targets.as_str().to_string(),
            version: 0,
            expires: Utc::now(),
            targets: BTreeMap::new(),
        }
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self::new()
    }
}

impl RolePayload for Targets {
    const ROLE: RoleName = RoleName::Targets;

    fn version(&self) -> u64 {
        self.version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn prepare_resign(&mut self, expires: DateTime<Utc>) {
        self.version += 1;
        self.expires = expires;
    }
}

/// The snapshot payload: pinned versions and digests of root and targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    /// Role name to metadata-file description
    pub meta: BTreeMap<String, SnapshotFileMeta>,
}

impl Snapshot {
    /// Build an empty unsigned snapshot payload at version zero
    pub fn new() -> Self {
        Snapshot {
            type_name: RoleName::Snapshot.as_str().to_string(),
            version: 0,
            expires: Utc::now(),
            meta: BTreeMap::new(),
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RolePayload for Snapshot {
    const ROLE: RoleName = RoleName::Snapshot;

    fn version(&self) -> u64 {
        self.version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn prepare_resign(&mut self, expires: DateTime<Utc>) {
        self.version += 1;
        self.expires = expires;
    }
}

/// The timestamp payload, produced server-side: pins the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    #[serde(rename = "_type")]
    pub type_name: String,
    pub version: u64,
    pub expires: DateTime<Utc>,
    /// Snapshot metadata-file description
    pub meta: BTreeMap<String, SnapshotFileMeta>,
}

impl RolePayload for Timestamp {
    const ROLE: RoleName = RoleName::Timestamp;

    fn version(&self) -> u64 {
        self.version
    }

    fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    fn prepare_resign(&mut self, expires: DateTime<Utc>) {
        self.version += 1;
        self.expires = expires;
    }
}
