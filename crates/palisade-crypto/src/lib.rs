//! Cryptographic primitives for palisade
//!
//! This crate provides key generation, role-payload signing and
//! verification, and the X.509 handling the trust-bootstrap path relies
//! on: certificate parsing, fingerprints, leaf selection from PEM
//! bundles, and minting the self-signed root certificate for a GUN.

pub mod error;
pub mod keypair;
pub mod mint;
pub mod verify;
pub mod x509;

pub use error::{Error, Result};
pub use keypair::KeyPair;
pub use mint::{mint_certificate, MintedCertificate};
pub use verify::verify_signature;
pub use x509::{
    cert_to_pem, certs_from_pem, fingerprint, leaf_from_bundle, parse_certificate,
    CertificateInfo,
};
