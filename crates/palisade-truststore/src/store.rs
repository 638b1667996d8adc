//! Directory-backed certificate stores with admission filters

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use palisade_crypto::x509::{certs_from_pem, cert_to_pem, parse_certificate, verify_signed_by};
use palisade_crypto::CertificateInfo;

use crate::error::{Error, Result};

/// Admission predicate over a parsed certificate
pub type CertFilter = Box<dyn Fn(&CertificateInfo) -> bool + Send + Sync>;

/// CA-anchor filter: CA bit set with valid basic constraints, a subject
/// key id, unexpired, and not SHA-1 signed
pub fn ca_filter(cert: &CertificateInfo) -> bool {
    cert.is_ca
        && cert.basic_constraints_present
        && cert.subject_key_id.is_some()
        && !cert.expired(Utc::now())
        && !cert.sha1_signed()
}

/// Leaf filter: not a CA, unexpired, and not SHA-1 signed
pub fn leaf_filter(cert: &CertificateInfo) -> bool {
    !cert.is_ca && !cert.expired(Utc::now()) && !cert.sha1_signed()
}

/// A filtered view over a directory of PEM certificates
///
/// Certificates are indexed by fingerprint. The directory is scanned
/// once at load; `add_cert` keeps disk and memory in step.
pub struct CertificateStore {
    dir: PathBuf,
    filter: CertFilter,
    certs: HashMap<String, CertificateInfo>,
}

impl CertificateStore {
    /// Load a store over `dir` with an admission filter
    ///
    /// The directory is created if missing. Files that do not parse as
    /// certificates are skipped with a debug log; certificates failing
    /// the filter are silently excluded from the view.
    pub fn load(dir: impl AsRef<Path>, filter: CertFilter) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut certs = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let raw = fs::read(&path)?;
            let ders = match certs_from_pem(&raw) {
                Ok(ders) => ders,
                Err(e) => {
                    tracing::debug!(path = %path.display(), "skipping non-certificate file: {e}");
                    continue;
                }
            };
            for der in ders {
                let info = match parse_certificate(&der) {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), "skipping unparseable certificate: {e}");
                        continue;
                    }
                };
                if filter(&info) {
                    certs.insert(info.fingerprint.clone(), info);
                }
            }
        }

        Ok(CertificateStore { dir, filter, certs })
    }

    /// Load the CA-anchor view of a trust directory
    pub fn ca_store(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load(dir, Box::new(ca_filter))
    }

    /// Load the leaf-certificate view of a trust directory
    pub fn leaf_store(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load(dir, Box::new(leaf_filter))
    }

    /// Look up a certificate by fingerprint
    pub fn get_by_fingerprint(&self, fingerprint: &str) -> Result<&CertificateInfo> {
        self.certs
            .get(fingerprint)
            .ok_or_else(|| Error::NotFound(fingerprint.to_string()))
    }

    /// Add a certificate: persist it under `<fingerprint>.pem` and index it
    ///
    /// The certificate must pass the store's admission filter. Adding an
    /// already-present certificate rewrites the same content and is
    /// harmless.
    pub fn add_cert(&mut self, info: CertificateInfo) -> Result<()> {
        if !(self.filter)(&info) {
            return Err(Error::Rejected(info.fingerprint));
        }

        let path = self.dir.join(format!("{}.pem", info.fingerprint));
        let tmp = self.dir.join(format!(".{}.pem.tmp", info.fingerprint));
        fs::write(&tmp, cert_to_pem(&info.der))?;
        fs::rename(&tmp, &path)?;

        self.certs.insert(info.fingerprint.clone(), info);
        Ok(())
    }

    /// Verify a chain against the store's anchors for a collection
    ///
    /// `chain` is leaf-first; intermediates, if any, follow. Succeeds iff
    /// the leaf's Common Name equals the GUN and the leaf links (directly
    /// or through the supplied intermediates) to a certificate in this
    /// store whose key verifies each hop's signature.
    pub fn verify_chain(&self, chain: &[CertificateInfo], gun: &str) -> Result<()> {
        let leaf = chain
            .first()
            .ok_or_else(|| Error::UntrustedChain("empty chain".to_string()))?;

        if leaf.common_name.as_deref() != Some(gun) {
            return Err(Error::CommonNameMismatch {
                expected: gun.to_string(),
                actual: leaf.common_name.clone(),
            });
        }

        let now = Utc::now();
        if leaf.expired(now) {
            return Err(Error::UntrustedChain("leaf certificate expired".to_string()));
        }
        if leaf.sha1_signed() {
            return Err(Error::UntrustedChain(
                "leaf certificate is SHA-1 signed".to_string(),
            ));
        }

        let intermediates = &chain[1..];
        let mut current = leaf;
        // Each hop consumes an intermediate at most once, so the walk is
        // bounded by the chain length.
        for _ in 0..chain.len() {
            for anchor in self.certs.values() {
                if verify_signed_by(current, anchor).is_ok() {
                    return Ok(());
                }
            }
            match intermediates
                .iter()
                .find(|cand| verify_signed_by(current, cand).is_ok())
            {
                Some(next) => current = next,
                None => break,
            }
        }

        Err(Error::UntrustedChain(format!(
            "no path from {} to a trusted anchor",
            leaf.fingerprint
        )))
    }

    /// Number of admitted certificates
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the view holds no certificates
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_crypto::{mint_certificate, KeyPair};
    use tempfile::TempDir;

    fn minted_leaf(gun: &str) -> CertificateInfo {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, gun).unwrap();
        parse_certificate(&minted.der).unwrap()
    }

    #[test]
    fn test_leaf_store_add_and_lookup() {
        let dir = TempDir::new().unwrap();
        let mut store = CertificateStore::leaf_store(dir.path()).unwrap();
        assert!(store.is_empty());

        let leaf = minted_leaf("registry.example/app");
        let fp = leaf.fingerprint.clone();
        store.add_cert(leaf).unwrap();

        assert!(store.get_by_fingerprint(&fp).is_ok());
        assert!(dir.path().join(format!("{fp}.pem")).exists());

        // A fresh scan of the same directory sees the persisted cert.
        let reloaded = CertificateStore::leaf_store(dir.path()).unwrap();
        assert!(reloaded.get_by_fingerprint(&fp).is_ok());
    }

    #[test]
    fn test_ca_store_rejects_leaf_certificates() {
        let dir = TempDir::new().unwrap();
        let mut ca = CertificateStore::ca_store(dir.path()).unwrap();
        let leaf = minted_leaf("registry.example/app");
        assert!(matches!(ca.add_cert(leaf), Err(Error::Rejected(_))));
    }

    #[test]
    fn test_stores_share_a_directory_with_disjoint_views() {
        let dir = TempDir::new().unwrap();
        let mut leaf_view = CertificateStore::leaf_store(dir.path()).unwrap();
        let leaf = minted_leaf("registry.example/app");
        let fp = leaf.fingerprint.clone();
        leaf_view.add_cert(leaf).unwrap();

        let ca_view = CertificateStore::ca_store(dir.path()).unwrap();
        assert!(ca_view.get_by_fingerprint(&fp).is_err());
    }

    #[test]
    fn test_filters_exclude_expired_certificates() {
        let mut leaf = minted_leaf("registry.example/app");
        assert!(leaf_filter(&leaf));

        leaf.not_after = Utc::now() - chrono::Duration::hours(1);
        assert!(!leaf_filter(&leaf));
        assert!(!ca_filter(&leaf));
    }

    #[test]
    fn test_filters_exclude_sha1_signatures() {
        let mut sha1 = minted_leaf("registry.example/app");
        // sha1WithRSAEncryption
        sha1.signature_oid = "1.2.840.113549.1.1.5".parse().unwrap();
        assert!(sha1.sha1_signed());
        assert!(!leaf_filter(&sha1));
        assert!(!ca_filter(&sha1));
    }

    #[test]
    fn test_ca_filter_requires_ca_markers() {
        let leaf = minted_leaf("registry.example/app");
        assert!(!ca_filter(&leaf));

        let mut ca = leaf.clone();
        ca.is_ca = true;
        ca.basic_constraints_present = true;
        ca.subject_key_id = Some(vec![1, 2, 3]);
        assert!(ca_filter(&ca));
    }

    #[test]
    fn test_verify_chain_cn_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = CertificateStore::ca_store(dir.path()).unwrap();
        let leaf = minted_leaf("other/gun");
        let err = store.verify_chain(&[leaf], "this/gun").unwrap_err();
        assert!(matches!(err, Error::CommonNameMismatch { .. }));
    }

    #[test]
    fn test_verify_chain_untrusted_without_anchor() {
        let dir = TempDir::new().unwrap();
        let store = CertificateStore::ca_store(dir.path()).unwrap();
        let leaf = minted_leaf("this/gun");
        let err = store.verify_chain(&[leaf], "this/gun").unwrap_err();
        assert!(matches!(err, Error::UntrustedChain(_)));
    }
}
