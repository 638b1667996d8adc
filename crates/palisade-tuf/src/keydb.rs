//! Verified key and role database

use std::collections::HashMap;

use palisade_types::{PublicKey, Role, RoleName, Root};

use crate::error::{Error, Result};

/// Keys and role records the engine currently trusts
///
/// Every key is verified on entry: the id under which a key is stored is
/// always the id derived from its canonical bytes, so a document cannot
/// smuggle a key in under a foreign id.
#[derive(Debug, Default)]
pub struct KeyDb {
    keys: HashMap<String, PublicKey>,
    roles: HashMap<RoleName, Role>,
}

impl KeyDb {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, returning its computed id
    pub fn add_key(&mut self, key: PublicKey) -> String {
        let id = key.id();
        self.keys.insert(id.clone(), key);
        id
    }

    /// Add a role record; every referenced key must already be present
    pub fn add_role(&mut self, role: Role) -> Result<()> {
        for key_id in &role.key_ids {
            if !self.keys.contains_key(key_id) {
                return Err(Error::UnknownKey {
                    role: role.name,
                    key_id: key_id.clone(),
                });
            }
        }
        self.roles.insert(role.name, role);
        Ok(())
    }

    /// Look up a key by id
    pub fn get_key(&self, key_id: &str) -> Option<&PublicKey> {
        self.keys.get(key_id)
    }

    /// Look up a role record
    pub fn get_role(&self, name: RoleName) -> Option<&Role> {
        self.roles.get(&name)
    }

    /// All keys, by id
    pub fn keys(&self) -> &HashMap<String, PublicKey> {
        &self.keys
    }

    /// Build a database from a root payload
    ///
    /// Rejects key entries whose claimed id does not match their content
    /// and role records referencing unknown keys.
    pub fn from_root(root: &Root) -> Result<Self> {
        let mut db = KeyDb::new();
        for (claimed, key) in &root.keys {
            let computed = key.id();
            if *claimed != computed {
                return Err(Error::KeyIdMismatch {
                    claimed: claimed.clone(),
                    computed,
                });
            }
            db.add_key(key.clone());
        }
        for (name, role_keys) in &root.roles {
            let role = Role::new(*name, role_keys.threshold, role_keys.key_ids.clone())?;
            db.add_role(role)?;
        }
        Ok(db)
    }
}
