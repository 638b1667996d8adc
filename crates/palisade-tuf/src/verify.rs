//! Signature verification over signed role documents
//!
//! Verification always runs over the canonical bytes of the payload, so
//! the result is independent of how the source document was formatted.
//! A signature only counts when its key id is listed for the role, the
//! key is present, and the signature verifies; duplicate key ids count
//! once.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use palisade_crypto::verify_signature;
use palisade_types::{PublicKey, RoleName, Root, Signed};

use crate::error::{Error, Result};
use crate::keydb::KeyDb;

/// The version/expiry header every role payload carries
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadHeader {
    /// Payload version
    pub version: u64,
    /// Payload expiry
    pub expires: DateTime<Utc>,
}

/// Count distinct valid signatures from a set of allowed keys
///
/// Returns the number of distinct key ids that produced a valid
/// signature, failing if it is below `threshold`.
pub fn verify_signed(
    signed: &Signed,
    role: RoleName,
    keys: &HashMap<String, PublicKey>,
    allowed_ids: &HashSet<String>,
    threshold: u32,
) -> Result<usize> {
    let payload = signed.canonical_bytes()?;

    let mut valid: HashSet<&str> = HashSet::new();
    for sig in &signed.signatures {
        if valid.contains(sig.key_id.as_str()) {
            continue;
        }
        if !allowed_ids.contains(&sig.key_id) {
            continue;
        }
        let Some(key) = keys.get(&sig.key_id) else {
            continue;
        };
        match verify_signature(key, &payload, &sig.sig) {
            Ok(()) => {
                valid.insert(&sig.key_id);
            }
            Err(e) => {
                tracing::debug!(key_id = %sig.key_id, "invalid {role} signature: {e}");
            }
        }
    }

    if (valid.len() as u32) < threshold {
        return Err(Error::VerificationFailed {
            role,
            valid: valid.len(),
            threshold,
        });
    }
    Ok(valid.len())
}

/// Verify a root document against an explicit trusted key set
///
/// Used on the bootstrap path, where trust comes from the certificate
/// stores rather than an existing key database. `min_version` zero
/// accepts any version. Returns the parsed payload.
pub fn verify_root(
    signed: &Signed,
    min_version: u64,
    trusted: &HashMap<String, PublicKey>,
    threshold: u32,
) -> Result<Root> {
    let allowed: HashSet<String> = trusted.keys().cloned().collect();
    verify_signed(signed, RoleName::Root, trusted, &allowed, threshold)?;

    let root: Root = signed.parse_payload()?;
    check_header(RoleName::Root, root.version, root.expires, min_version)?;
    Ok(root)
}

/// Verify a pulled role document against the key database
///
/// Checks signatures against the role's record, the version floor, and
/// the expiry. Returns the payload header.
pub fn verify_role(
    signed: &Signed,
    role: RoleName,
    keydb: &KeyDb,
    min_version: u64,
) -> Result<PayloadHeader> {
    let record = keydb.get_role(role).ok_or(Error::MissingRole(role))?;
    let allowed: HashSet<String> = record.key_ids.iter().cloned().collect();
    verify_signed(signed, role, keydb.keys(), &allowed, record.threshold)?;

    let header: PayloadHeader = signed.parse_payload()?;
    check_header(role, header.version, header.expires, min_version)?;
    Ok(header)
}

fn check_header(
    role: RoleName,
    version: u64,
    expires: DateTime<Utc>,
    min_version: u64,
) -> Result<()> {
    if version < min_version {
        return Err(Error::VersionRollback {
            role,
            current: min_version,
            received: version,
        });
    }
    if expires <= Utc::now() {
        return Err(Error::Expired {
            role,
            expired: expires,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_crypto::KeyPair;
    use palisade_types::{Signature, SignatureMethod, Signed};

    fn signed_doc(kp: &KeyPair, payload: serde_json::Value) -> (Signed, PublicKey) {
        let public = kp.public_key().unwrap();
        let signed = Signed {
            signed: payload,
            signatures: vec![],
        };
        let sig = kp.sign(&signed.canonical_bytes().unwrap()).unwrap();
        let signed = Signed {
            signatures: vec![Signature::new(
                public.id(),
                SignatureMethod::Ecdsa,
                sig,
            )],
            ..signed
        };
        (signed, public)
    }

    fn far_future() -> String {
        (Utc::now() + chrono::Duration::days(30)).to_rfc3339()
    }

    #[test]
    fn test_verify_signed_counts_distinct_keys_once() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let (mut signed, public) = signed_doc(&kp, serde_json::json!({"version": 1}));
        // Duplicate the same signature; it must still count once.
        signed.signatures.push(signed.signatures[0].clone());

        let mut keys = HashMap::new();
        keys.insert(public.id(), public.clone());
        let allowed: HashSet<String> = keys.keys().cloned().collect();

        let valid =
            verify_signed(&signed, RoleName::Root, &keys, &allowed, 1).unwrap();
        assert_eq!(valid, 1);
        assert!(matches!(
            verify_signed(&signed, RoleName::Root, &keys, &allowed, 2),
            Err(Error::VerificationFailed { valid: 1, .. })
        ));
    }

    #[test]
    fn test_verify_signed_ignores_unlisted_keys() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let (signed, public) = signed_doc(&kp, serde_json::json!({"version": 1}));

        let mut keys = HashMap::new();
        keys.insert(public.id(), public);
        let allowed = HashSet::new();

        assert!(matches!(
            verify_signed(&signed, RoleName::Root, &keys, &allowed, 1),
            Err(Error::VerificationFailed { valid: 0, .. })
        ));
    }

    #[test]
    fn test_verify_root_version_floor_and_expiry() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let payload = serde_json::json!({
            "_type": "root",
            "version": 3,
            "expires": far_future(),
            "keys": {},
            "roles": {},
            "consistent_snapshot": false,
        });
        let (signed, public) = signed_doc(&kp, payload);

        let mut trusted = HashMap::new();
        trusted.insert(public.id(), public);

        // Version floor zero accepts any version.
        assert!(verify_root(&signed, 0, &trusted, 1).is_ok());
        assert!(verify_root(&signed, 3, &trusted, 1).is_ok());
        assert!(matches!(
            verify_root(&signed, 4, &trusted, 1),
            Err(Error::VersionRollback { .. })
        ));
    }

    #[test]
    fn test_verify_root_rejects_expired() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let payload = serde_json::json!({
            "_type": "root",
            "version": 1,
            "expires": (Utc::now() - chrono::Duration::hours(1)).to_rfc3339(),
            "keys": {},
            "roles": {},
            "consistent_snapshot": false,
        });
        let (signed, public) = signed_doc(&kp, payload);

        let mut trusted = HashMap::new();
        trusted.insert(public.id(), public);

        assert!(matches!(
            verify_root(&signed, 0, &trusted, 1),
            Err(Error::Expired { .. })
        ));
    }

    #[test]
    fn test_verify_signed_rejects_tampered_payload() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let (mut signed, public) = signed_doc(&kp, serde_json::json!({"version": 1}));
        signed.signed = serde_json::json!({"version": 99});

        let mut keys = HashMap::new();
        keys.insert(public.id(), public);
        let allowed: HashSet<String> = keys.keys().cloned().collect();

        assert!(verify_signed(&signed, RoleName::Root, &keys, &allowed, 1).is_err());
    }
}
