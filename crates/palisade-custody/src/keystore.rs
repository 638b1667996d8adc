//! Encrypted key files and trust links

use std::fs;
use std::path::{Path, PathBuf};

use pkcs8::der::Decode;
use pkcs8::{EncodePrivateKey, EncryptedPrivateKeyInfo, LineEnding};
use zeroize::Zeroizing;

use palisade_crypto::KeyPair;

use crate::error::{Error, Result};

const PEM_TAG: &str = "ENCRYPTED PRIVATE KEY";

/// Directory of encrypted private keys, one PEM file per key id
///
/// Trust links are symlinks from an external id to the internal key
/// file, so resolution is a plain read of the external name.
#[derive(Debug, Clone)]
pub struct KeyFileStore {
    dir: PathBuf,
}

impl KeyFileStore {
    /// Open (creating if needed) a key directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, id: &str) -> Result<PathBuf> {
        // Ids are hex digests; anything else never names a file.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidKeyId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.pem")))
    }

    /// Whether a key (or link) rests under the id
    pub fn contains(&self, id: &str) -> bool {
        self.key_path(id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Store a key encrypted under a passphrase
    ///
    /// Idempotent for the same key: re-adding under an id that already
    /// holds this key is a no-op, while a different key under the same
    /// id is refused. The write is temp-then-rename.
    pub fn add_encrypted(&self, id: &str, key: &KeyPair, passphrase: &str) -> Result<()> {
        let path = self.key_path(id)?;
        if path.exists() {
            let existing = self.get_decrypted(id, passphrase)?;
            let same = existing.public_spki_der()? == key.public_spki_der()?;
            if same {
                return Ok(());
            }
            return Err(Error::KeyExists(id.to_string()));
        }

        let pem = encrypt_to_pem(key, passphrase)?;
        let tmp = self.dir.join(format!(".{id}.pem.tmp"));
        fs::write(&tmp, pem.as_bytes())?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(id, "stored encrypted key");
        Ok(())
    }

    /// Decrypt a key by id (or linked external id)
    pub fn get_decrypted(&self, id: &str, passphrase: &str) -> Result<KeyPair> {
        let path = self.key_path(id)?;
        let pem_text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::KeyNotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let block = pem::parse(pem_text.as_bytes())
            .map_err(|e| Error::Encoding(format!("key {id}: {e}")))?;
        if block.tag() != PEM_TAG {
            return Err(Error::Encoding(format!(
                "key {id}: unexpected PEM tag {}",
                block.tag()
            )));
        }

        let info = EncryptedPrivateKeyInfo::from_der(block.contents())
            .map_err(|e| Error::Encoding(format!("key {id}: {e}")))?;
        let decrypted = info
            .decrypt(passphrase.as_bytes())
            .map_err(|_| Error::WrongPassphrase(id.to_string()))?;

        Ok(KeyPair::from_pkcs8_der(decrypted.as_bytes())?)
    }

    /// Record a trust link: `external_id` resolves to `internal_id`'s key
    ///
    /// Re-linking the same pair is a no-op. Many external ids may point
    /// at one internal key.
    pub fn link(&self, external_id: &str, internal_id: &str) -> Result<()> {
        let link_path = self.key_path(external_id)?;
        self.key_path(internal_id)?;
        let target = format!("{internal_id}.pem");

        // exists() follows symlinks and misses a dangling link, so test
        // the link entry itself.
        if fs::symlink_metadata(&link_path).is_ok() {
            fs::remove_file(&link_path)?;
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, &link_path)?;
        #[cfg(not(unix))]
        fs::copy(self.dir.join(&target), &link_path)?;

        tracing::debug!(external_id, internal_id, "linked trust identifier");
        Ok(())
    }
}

/// Encrypt a key pair to a scrypt-AES PKCS#8 PEM string
fn encrypt_to_pem(key: &KeyPair, passphrase: &str) -> Result<Zeroizing<String>> {
    let mut rng = rand::thread_rng();
    let pem = match key {
        KeyPair::Rsa(inner) => {
            inner.to_pkcs8_encrypted_pem(&mut rng, passphrase.as_bytes(), LineEnding::LF)
        }
        KeyPair::Ecdsa(inner) => {
            inner.to_pkcs8_encrypted_pem(&mut rng, passphrase.as_bytes(), LineEnding::LF)
        }
    }
    .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(pem)
}
