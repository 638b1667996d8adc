//! Self-signed certificate minting
//!
//! Initialize mints one self-signed leaf certificate per collection with
//! the GUN as the subject Common Name. The certificate wraps the root
//! public key so the TUF root document ties into the X.509 PKI.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, IsCa, KeyPair as RcgenKeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256, PKCS_RSA_SHA256,
};
use rustls_pki_types::PrivatePkcs8KeyDer;

use palisade_types::KeyAlgorithm;

use crate::error::{Error, Result};
use crate::keypair::KeyPair;
use crate::x509::{cert_to_pem, fingerprint};

/// Validity of minted root certificates, matching the root role's
/// ten-year default expiry
const CERT_VALIDITY_DAYS: i64 = 3650;

/// Clock-skew allowance on the front of the validity window
const NOT_BEFORE_SKEW_MINUTES: i64 = 5;

/// A freshly minted certificate in the encodings callers need
#[derive(Debug, Clone)]
pub struct MintedCertificate {
    /// Raw DER bytes
    pub der: Vec<u8>,
    /// PEM encoding of the same certificate
    pub pem: String,
    /// Hex SHA-256 fingerprint of the DER bytes
    pub fingerprint: String,
}

/// Mint a self-signed leaf certificate for a GUN over a key pair
pub fn mint_certificate(key: &KeyPair, gun: &str) -> Result<MintedCertificate> {
    let pkcs8 = key
        .to_pkcs8_der()
        .map_err(|e| Error::Minting(format!("failed to export key: {e}")))?;
    let key_der = PrivatePkcs8KeyDer::from(pkcs8.as_bytes());

    let sign_algo = match key.algorithm() {
        KeyAlgorithm::Ecdsa => &PKCS_ECDSA_P256_SHA256,
        KeyAlgorithm::Rsa => &PKCS_RSA_SHA256,
        other => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "cannot mint a certificate over a {other} key"
            )))
        }
    };
    let signing_key = RcgenKeyPair::from_pkcs8_der_and_sign_algo(&key_der, sign_algo)
        .map_err(|e| Error::Minting(format!("failed to load key: {e}")))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, gun);
    params.distinguished_name = dn;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now - time::Duration::minutes(NOT_BEFORE_SKEW_MINUTES);
    params.not_after = now + time::Duration::days(CERT_VALIDITY_DAYS);

    let cert = params
        .self_signed(&signing_key)
        .map_err(|e| Error::Minting(format!("failed to sign certificate: {e}")))?;

    let der = cert.der().to_vec();
    Ok(MintedCertificate {
        pem: cert_to_pem(&der),
        fingerprint: fingerprint(&der),
        der,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::parse_certificate;

    #[test]
    fn test_mint_sets_common_name() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, "quay.io/org/image").unwrap();
        let info = parse_certificate(&minted.der).unwrap();
        assert_eq!(info.common_name.as_deref(), Some("quay.io/org/image"));
    }

    #[test]
    fn test_mint_carries_the_key_public_material() {
        let kp = KeyPair::generate_ecdsa().unwrap();
        let minted = mint_certificate(&kp, "gun").unwrap();
        let info = parse_certificate(&minted.der).unwrap();
        assert_eq!(info.spki_der, kp.public_spki_der().unwrap());
    }
}
