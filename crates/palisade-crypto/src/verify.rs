//! Signature verification over role payloads
//!
//! Dispatches on the metadata key algorithm. For the x509-wrapped
//! variants the public entry is a PEM certificate bundle; the leaf's
//! SubjectPublicKeyInfo is the verification key.

use p256::ecdsa::signature::Verifier as _;
use rsa::sha2::Sha256;
use rsa::RsaPublicKey;
use spki::DecodePublicKey as _;

use palisade_types::{KeyAlgorithm, PublicKey};

use crate::error::{Error, Result};
use crate::x509::leaf_from_bundle;

/// Verify a signature over `data` with a metadata key entry
pub fn verify_signature(key: &PublicKey, data: &[u8], sig: &[u8]) -> Result<()> {
    match key.algorithm {
        KeyAlgorithm::Ecdsa => verify_ecdsa_der(key.public_bytes(), data, sig),
        KeyAlgorithm::Rsa => verify_rsa_pss(key.public_bytes(), data, sig),
        KeyAlgorithm::EcdsaX509 | KeyAlgorithm::RsaX509 => {
            let leaf = leaf_from_bundle(key.public_bytes())?;
            match leaf.key_algorithm {
                KeyAlgorithm::Ecdsa => verify_ecdsa_der(&leaf.spki_der, data, sig),
                KeyAlgorithm::Rsa => verify_rsa_pss(&leaf.spki_der, data, sig),
                other => Err(Error::UnsupportedAlgorithm(format!(
                    "certificate carries a {other} key"
                ))),
            }
        }
    }
}

/// Verify an ASN.1 DER ECDSA P-256 signature against an SPKI key
pub(crate) fn verify_ecdsa_der(spki_der: &[u8], data: &[u8], sig: &[u8]) -> Result<()> {
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(spki_der)?;
    let sig = p256::ecdsa::Signature::from_der(sig)
        .map_err(|e| Error::Verification(format!("malformed ECDSA signature: {e}")))?;
    key.verify(data, &sig)
        .map_err(|_| Error::Verification("ECDSA P-256 signature invalid".to_string()))
}

/// Verify an RSASSA-PSS SHA-256 signature against an SPKI key
pub(crate) fn verify_rsa_pss(spki_der: &[u8], data: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::from_public_key_der(spki_der)?;
    let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(key);
    let sig = rsa::pss::Signature::try_from(sig)
        .map_err(|e| Error::Verification(format!("malformed RSA signature: {e}")))?;
    verifying_key
        .verify(data, &sig)
        .map_err(|_| Error::Verification("RSA PSS SHA-256 signature invalid".to_string()))
}

/// Verify an RSA PKCS#1 v1.5 SHA-256 signature against an SPKI key
///
/// Used for certificate signatures, which use PKCS#1 v1.5 rather than PSS.
pub(crate) fn verify_rsa_pkcs1(spki_der: &[u8], data: &[u8], sig: &[u8]) -> Result<()> {
    let key = RsaPublicKey::from_public_key_der(spki_der)?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key);
    let sig = rsa::pkcs1v15::Signature::try_from(sig)
        .map_err(|e| Error::Verification(format!("malformed RSA signature: {e}")))?;
    verifying_key
        .verify(data, &sig)
        .map_err(|_| Error::Verification("RSA PKCS#1 SHA-256 signature invalid".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;
    use crate::mint::mint_certificate;

    #[test]
    fn test_verify_x509_wrapped_key() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let cert_pem = mint_certificate(&kp, "docker.io/library/app").unwrap().pem;

        let key = PublicKey::new(KeyAlgorithm::EcdsaX509, cert_pem.into_bytes());
        let data = b"signed payload";
        let sig = kp.sign(data).unwrap();

        assert!(verify_signature(&key, data, &sig).is_ok());
        assert!(verify_signature(&key, b"tampered", &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let key = kp.public_key().unwrap();
        assert!(verify_signature(&key, b"data", &[0u8; 70]).is_err());
    }
}
