//! X.509 certificate parsing and fingerprints
//!
//! The trust store filters and the root-validation path both work from
//! `CertificateInfo`, a flattened view of the fields they inspect. A
//! certificate's fingerprint is the hex SHA-256 of its DER bytes and is
//! the external identifier linking it to a backing private key.

use chrono::{DateTime, Utc};
use const_oid::db::rfc4519::CN;
use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1};
use const_oid::ObjectIdentifier;
use der::asn1::{PrintableStringRef, Utf8StringRef};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use x509_cert::ext::pkix::{BasicConstraints, SubjectKeyIdentifier};
use x509_cert::Certificate;

use palisade_types::KeyAlgorithm;

use crate::error::{Error, Result};
use crate::verify::{verify_ecdsa_der, verify_rsa_pkcs1};

/// sha1WithRSAEncryption: 1.2.840.113549.1.1.5
const SHA_1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");

/// dsa-with-sha1: 1.2.840.10040.4.3
const DSA_WITH_SHA_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.3");

/// ecdsa-with-SHA1: 1.2.840.10045.4.1
const ECDSA_WITH_SHA_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

/// ecdsa-with-SHA256: 1.2.840.10045.4.3.2
const ECDSA_WITH_SHA_256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// sha256WithRSAEncryption: 1.2.840.113549.1.1.11
const SHA_256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Flattened view of the certificate fields trust decisions inspect
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Raw DER bytes
    pub der: Vec<u8>,
    /// Hex SHA-256 of the DER bytes
    pub fingerprint: String,
    /// Subject Common Name, if present
    pub common_name: Option<String>,
    /// DER-encoded subject name, for issuer matching
    pub subject_der: Vec<u8>,
    /// DER-encoded issuer name
    pub issuer_der: Vec<u8>,
    /// Whether the BasicConstraints extension marks this as a CA
    pub is_ca: bool,
    /// Whether a BasicConstraints extension is present at all
    pub basic_constraints_present: bool,
    /// SubjectKeyIdentifier bytes, if the extension is present
    pub subject_key_id: Option<Vec<u8>>,
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
    /// OID of the certificate's signature algorithm
    pub signature_oid: ObjectIdentifier,
    /// DER-encoded SubjectPublicKeyInfo
    pub spki_der: Vec<u8>,
    /// Raw algorithm of the subject public key
    pub key_algorithm: KeyAlgorithm,
}

impl CertificateInfo {
    /// Whether the validity window has closed at `now`
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.not_after <= now
    }

    /// Whether the certificate is signed with a SHA-1 family algorithm
    pub fn sha1_signed(&self) -> bool {
        self.signature_oid == SHA_1_WITH_RSA
            || self.signature_oid == DSA_WITH_SHA_1
            || self.signature_oid == ECDSA_WITH_SHA_1
    }
}

/// Hex SHA-256 fingerprint of DER certificate bytes
pub fn fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

/// Parse certificate information from DER bytes
pub fn parse_certificate(der_bytes: &[u8]) -> Result<CertificateInfo> {
    let cert = Certificate::from_der(der_bytes)
        .map_err(|e| Error::InvalidCertificate(format!("failed to parse certificate: {e}")))?;

    let tbs = &cert.tbs_certificate;

    let not_before = unix_to_datetime(tbs.validity.not_before.to_unix_duration().as_secs())?;
    let not_after = unix_to_datetime(tbs.validity.not_after.to_unix_duration().as_secs())?;

    let basic_constraints: Option<(bool, BasicConstraints)> = tbs
        .get()
        .map_err(|e| Error::InvalidCertificate(format!("bad BasicConstraints: {e}")))?;
    let subject_key_id: Option<(bool, SubjectKeyIdentifier)> = tbs
        .get()
        .map_err(|e| Error::InvalidCertificate(format!("bad SubjectKeyIdentifier: {e}")))?;

    let spki = &tbs.subject_public_key_info;
    let spki_der = spki
        .to_der()
        .map_err(|e| Error::InvalidCertificate(format!("failed to encode SPKI: {e}")))?;
    let key_algorithm = key_algorithm_of(spki)?;

    Ok(CertificateInfo {
        der: der_bytes.to_vec(),
        fingerprint: fingerprint(der_bytes),
        common_name: common_name(&tbs.subject),
        subject_der: tbs.subject.to_der()?,
        issuer_der: tbs.issuer.to_der()?,
        is_ca: basic_constraints.as_ref().map(|(_, bc)| bc.ca).unwrap_or(false),
        basic_constraints_present: basic_constraints.is_some(),
        subject_key_id: subject_key_id.map(|(_, skid)| skid.0.as_bytes().to_vec()),
        not_before,
        not_after,
        signature_oid: cert.signature_algorithm.oid,
        spki_der,
        key_algorithm,
    })
}

/// Decode every CERTIFICATE block in a PEM document to DER
pub fn certs_from_pem(pem_bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let blocks = pem::parse_many(pem_bytes).map_err(|e| Error::Pem(e.to_string()))?;
    let certs: Vec<Vec<u8>> = blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| block.into_contents())
        .collect();
    if certs.is_empty() {
        return Err(Error::Pem("no CERTIFICATE blocks".to_string()));
    }
    Ok(certs)
}

/// Encode DER certificate bytes as a PEM block
pub fn cert_to_pem(der: &[u8]) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der))
}

/// Select the leaf certificate from a PEM bundle
///
/// The leaf is the first non-CA certificate. Bundles with no non-CA
/// entry are rejected rather than guessed at.
pub fn leaf_from_bundle(pem_bytes: &[u8]) -> Result<CertificateInfo> {
    let ders = certs_from_pem(pem_bytes)?;
    for der in &ders {
        let info = parse_certificate(der)?;
        if !info.is_ca {
            return Ok(info);
        }
    }
    Err(Error::InvalidCertificate(
        "no leaf (non-CA) certificate in bundle".to_string(),
    ))
}

/// Verify that `child`'s signature was produced by `issuer`'s key
///
/// Checks the issuer/subject name linkage and the signature over the
/// TBS bytes. Only SHA-256 signature algorithms are accepted.
pub fn verify_signed_by(child: &CertificateInfo, issuer: &CertificateInfo) -> Result<()> {
    if child.issuer_der != issuer.subject_der {
        return Err(Error::InvalidCertificate(
            "issuer name does not match".to_string(),
        ));
    }

    let cert = Certificate::from_der(&child.der)
        .map_err(|e| Error::InvalidCertificate(format!("failed to parse certificate: {e}")))?;
    let tbs = cert.tbs_certificate.to_der()?;
    let sig = cert.signature.raw_bytes();

    let oid = cert.signature_algorithm.oid;
    if oid == ECDSA_WITH_SHA_256 {
        verify_ecdsa_der(&issuer.spki_der, &tbs, sig)
    } else if oid == SHA_256_WITH_RSA {
        verify_rsa_pkcs1(&issuer.spki_der, &tbs, sig)
    } else {
        Err(Error::UnsupportedAlgorithm(format!(
            "certificate signature algorithm {oid}"
        )))
    }
}

fn unix_to_datetime(secs: u64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
        .ok_or_else(|| Error::InvalidCertificate("validity time out of range".to_string()))
}

fn common_name(name: &x509_cert::name::Name) -> Option<String> {
    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            if atv.oid != CN {
                continue;
            }
            if let Ok(s) = atv.value.decode_as::<Utf8StringRef>() {
                return Some(s.to_string());
            }
            if let Ok(s) = atv.value.decode_as::<PrintableStringRef>() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Determine the raw key algorithm from SubjectPublicKeyInfo
fn key_algorithm_of(spki: &x509_cert::spki::SubjectPublicKeyInfoOwned) -> Result<KeyAlgorithm> {
    let oid = spki.algorithm.oid;
    if oid == ID_EC_PUBLIC_KEY {
        if let Some(params) = &spki.algorithm.parameters {
            match ObjectIdentifier::from_bytes(params.value()) {
                Ok(curve) if curve == SECP_256_R_1 => {}
                Ok(curve) => {
                    tracing::warn!("unexpected EC curve OID {curve}, assuming P-256");
                }
                Err(e) => {
                    return Err(Error::InvalidCertificate(format!(
                        "failed to parse EC curve OID: {e}"
                    )));
                }
            }
        }
        Ok(KeyAlgorithm::Ecdsa)
    } else if oid == RSA_ENCRYPTION {
        Ok(KeyAlgorithm::Rsa)
    } else {
        Err(Error::UnsupportedAlgorithm(format!(
            "public key algorithm {oid}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;
    use crate::mint::mint_certificate;

    #[test]
    fn test_parse_minted_certificate() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, "registry.example/app").unwrap();

        let info = parse_certificate(&minted.der).unwrap();
        assert_eq!(info.common_name.as_deref(), Some("registry.example/app"));
        assert!(!info.is_ca);
        assert_eq!(info.key_algorithm, KeyAlgorithm::Ecdsa);
        assert!(!info.sha1_signed());
        assert!(!info.expired(Utc::now()));
        assert_eq!(info.fingerprint.len(), 64);
        assert_eq!(info.fingerprint, minted.fingerprint);
    }

    #[test]
    fn test_self_signed_verifies_against_itself() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, "registry.example/app").unwrap();
        let info = parse_certificate(&minted.der).unwrap();
        assert!(verify_signed_by(&info, &info).is_ok());
    }

    #[test]
    fn test_signature_check_rejects_wrong_issuer() {
        let kp_a = KeyPair::generate_ecdsa().unwrap();
        let kp_b = KeyPair::generate_ecdsa().unwrap();
        let a = parse_certificate(&mint_certificate(&kp_a, "gun/a").unwrap().der).unwrap();
        let b = parse_certificate(&mint_certificate(&kp_b, "gun/b").unwrap().der).unwrap();
        assert!(verify_signed_by(&a, &b).is_err());
    }

    #[test]
    fn test_pem_roundtrip_and_leaf_selection() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, "gun/app").unwrap();

        let pem = cert_to_pem(&minted.der);
        let ders = certs_from_pem(pem.as_bytes()).unwrap();
        assert_eq!(ders.len(), 1);
        assert_eq!(ders[0], minted.der);

        let leaf = leaf_from_bundle(pem.as_bytes()).unwrap();
        assert_eq!(leaf.fingerprint, minted.fingerprint);
    }

    #[test]
    fn test_certs_from_pem_rejects_empty() {
        assert!(certs_from_pem(b"not pem at all").is_err());
    }
}
