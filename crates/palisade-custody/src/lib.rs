//! Key custody for palisade
//!
//! Private keys rest encrypted on disk as scrypt-AES PKCS#8 PEM blobs,
//! named by key id. A trust link aliases an external identifier (a
//! certificate-derived key id) to the internal id of the private key
//! behind it, so the root key can still be found after certificate
//! rotation. Keys only exist decrypted inside a [`Signer`] or for the
//! duration of one [`KeyService`] signing call; the underlying key types
//! zeroize their material on drop.

pub mod error;
pub mod keystore;
pub mod service;

pub use error::{Error, Result};
pub use keystore::KeyFileStore;
pub use service::{KeyService, Signer};
