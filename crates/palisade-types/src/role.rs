//! Role names, role records, and default expiries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The four top-level TUF roles
///
/// Role names are a closed set. They double as metadata-store keys, so
/// keeping them an enum guarantees a role name never carries path
/// separators into the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleName {
    /// Trust anchor; delegates to the other roles
    Root,
    /// What is published
    Targets,
    /// Integrity of the targets metadata
    Snapshot,
    /// Freshness; always held by the server
    Timestamp,
}

impl RoleName {
    /// All four roles, in root-first order
    pub const ALL: [RoleName; 4] = [
        RoleName::Root,
        RoleName::Targets,
        RoleName::Snapshot,
        RoleName::Timestamp,
    ];

    /// The lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Root => "root",
            RoleName::Targets => "targets",
            RoleName::Snapshot => "snapshot",
            RoleName::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for RoleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoleName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "root" => Ok(RoleName::Root),
            "targets" => Ok(RoleName::Targets),
            "snapshot" => Ok(RoleName::Snapshot),
            "timestamp" => Ok(RoleName::Timestamp),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// A role record: which keys sign a role and how many must agree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// The role this record describes
    pub name: RoleName,
    /// Minimum number of distinct valid signatures
    pub threshold: u32,
    /// Key ids trusted to sign this role
    #[serde(rename = "keyids")]
    pub key_ids: Vec<String>,
}

impl Role {
    /// Build a role record, enforcing the structural invariants:
    /// threshold at least one, a non-empty key set, and threshold not
    /// exceeding the number of keys.
    pub fn new(name: RoleName, threshold: u32, key_ids: Vec<String>) -> Result<Self> {
        if threshold < 1 {
            return Err(Error::InvalidRole(format!(
                "{name}: threshold must be at least 1"
            )));
        }
        if key_ids.is_empty() {
            return Err(Error::InvalidRole(format!("{name}: no key ids")));
        }
        let mut deduped = key_ids;
        deduped.sort();
        deduped.dedup();
        if (threshold as usize) > deduped.len() {
            return Err(Error::InvalidRole(format!(
                "{name}: threshold {threshold} exceeds {} distinct keys",
                deduped.len()
            )));
        }
        Ok(Role {
            name,
            threshold,
            key_ids: deduped,
        })
    }

    /// Check whether a key id is trusted for this role
    pub fn valid_key(&self, key_id: &str) -> bool {
        self.key_ids.iter().any(|id| id == key_id)
    }
}

/// Default expiry for freshly signed metadata of a role
///
/// Root is long-lived, targets and snapshot are re-signed on every
/// publish anyway, and timestamp turns over server-side every two weeks.
pub fn default_expires(role: RoleName) -> DateTime<Utc> {
    let now = Utc::now();
    match role {
        RoleName::Root => now + Duration::days(3650),
        RoleName::Targets | RoleName::Snapshot => now + Duration::days(1095),
        RoleName::Timestamp => now + Duration::days(14),
    }
}
