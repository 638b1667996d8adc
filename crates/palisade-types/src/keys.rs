//! Public-key entries and signatures
//!
//! A key's identity is the hex SHA-256 of its canonical JSON form, so the
//! id is deterministic over (algorithm, public bytes) and survives a
//! serialize/reparse round trip unchanged.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::base64_bytes;
use crate::error::Result;
use crate::signed::to_canonical_json;

/// Key algorithms accepted in role metadata
///
/// The x509 variants wrap the public key in a PEM-encoded certificate so
/// downstream verifiers can tie the TUF root to the X.509 PKI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA public key (PKCS#1/SPKI DER)
    #[serde(rename = "RSA")]
    Rsa,
    /// ECDSA P-256 public key (SPKI DER)
    #[serde(rename = "ECDSA")]
    Ecdsa,
    /// RSA public key carried inside a PEM X.509 certificate
    #[serde(rename = "RSAx509")]
    RsaX509,
    /// ECDSA public key carried inside a PEM X.509 certificate
    #[serde(rename = "ECDSAx509")]
    EcdsaX509,
}

impl KeyAlgorithm {
    /// The wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ecdsa => "ECDSA",
            KeyAlgorithm::RsaX509 => "RSAx509",
            KeyAlgorithm::EcdsaX509 => "ECDSAx509",
        }
    }

    /// Whether the public bytes are a PEM certificate rather than raw SPKI
    pub fn is_x509(&self) -> bool {
        matches!(self, KeyAlgorithm::RsaX509 | KeyAlgorithm::EcdsaX509)
    }

    /// The x509-wrapped counterpart of a raw algorithm
    pub fn x509_wrapped(&self) -> KeyAlgorithm {
        match self {
            KeyAlgorithm::Rsa | KeyAlgorithm::RsaX509 => KeyAlgorithm::RsaX509,
            KeyAlgorithm::Ecdsa | KeyAlgorithm::EcdsaX509 => KeyAlgorithm::EcdsaX509,
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The public material of a key entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Public bytes: SPKI DER for raw algorithms, PEM certificate bytes
    /// for the x509 variants
    #[serde(with = "base64_bytes")]
    pub public: Vec<u8>,
}

/// A public key as it appears in role metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// Key algorithm tag
    #[serde(rename = "keytype")]
    pub algorithm: KeyAlgorithm,
    /// Public material
    #[serde(rename = "keyval")]
    pub value: KeyValue,
}

impl PublicKey {
    /// Create a key entry from an algorithm and public bytes
    pub fn new(algorithm: KeyAlgorithm, public: Vec<u8>) -> Self {
        Self {
            algorithm,
            value: KeyValue { public },
        }
    }

    /// The public bytes
    pub fn public_bytes(&self) -> &[u8] {
        &self.value.public
    }

    /// Deterministic key id: hex SHA-256 over the canonical JSON form
    pub fn id(&self) -> String {
        // Canonicalizing a two-field struct of scalars cannot fail.
        let canonical = to_canonical_json(self).expect("canonical form of a public key");
        hex::encode(Sha256::digest(canonical))
    }
}

/// Signature methods recorded alongside signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// RSASSA-PSS with SHA-256
    #[serde(rename = "rsapss")]
    RsaPss,
    /// ECDSA P-256 with SHA-256, ASN.1 DER encoded
    #[serde(rename = "ecdsa")]
    Ecdsa,
}

impl SignatureMethod {
    /// The method a key of the given algorithm signs with
    pub fn for_algorithm(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Rsa | KeyAlgorithm::RsaX509 => SignatureMethod::RsaPss,
            KeyAlgorithm::Ecdsa | KeyAlgorithm::EcdsaX509 => SignatureMethod::Ecdsa,
        }
    }
}

/// One signature over a role payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Id of the signing key
    #[serde(rename = "keyid")]
    pub key_id: String,
    /// How the signature was produced
    pub method: SignatureMethod,
    /// Raw signature bytes
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
}

impl Signature {
    /// Create a signature record
    pub fn new(key_id: String, method: SignatureMethod, sig: Vec<u8>) -> Self {
        Self { key_id, method, sig }
    }
}

/// Parse a key entry from its JSON wire form
pub fn parse_public_key(raw: &[u8]) -> Result<PublicKey> {
    Ok(serde_json::from_slice(raw)?)
}
