//! Filesystem-backed metadata store
//!
//! Role documents live under `<root>/metadata/<role>.json`. Writes are
//! temp-then-rename so a crash never leaves a half-written document in
//! place.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::fs;

use palisade_types::RoleName;

use crate::error::{Error, Result};
use crate::MetadataStore;

/// Metadata store over a collection's local directory
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    metadata_dir: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at a collection directory
    ///
    /// The `metadata/` subdirectory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            metadata_dir: root.as_ref().join("metadata"),
        }
    }

    /// Path of a role's document
    fn meta_path(&self, role: RoleName) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", role.as_str()))
    }
}

impl MetadataStore for FilesystemStore {
    fn get_meta(
        &self,
        role: RoleName,
        max_size: u64,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move {
            let path = self.meta_path(role);
            let meta = match fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::MetaNotFound { role });
                }
                Err(e) => return Err(e.into()),
            };
            if meta.len() > max_size {
                return Err(Error::MetaTooLarge { role, max_size });
            }
            match fs::read(&path).await {
                Ok(data) => Ok(data),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(Error::MetaNotFound { role })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set_meta(
        &self,
        role: RoleName,
        data: &[u8],
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        let data = data.to_vec();
        Box::pin(async move {
            fs::create_dir_all(&self.metadata_dir).await?;

            let path = self.meta_path(role);
            let tmp = self
                .metadata_dir
                .join(format!(".{}.json.tmp", role.as_str()));
            fs::write(&tmp, &data).await?;
            fs::rename(&tmp, &path).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_filesystem_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemStore::new(dir.path());

        let body = br#"{"signed":{},"signatures":[]}"#;
        store.set_meta(RoleName::Root, body).await.unwrap();

        let read = store.get_meta(RoleName::Root, 1024).await.unwrap();
        assert_eq!(read, body);
        assert!(dir.path().join("metadata/root.json").exists());
    }

    #[tokio::test]
    async fn test_missing_meta_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemStore::new(dir.path());
        let err = store.get_meta(RoleName::Snapshot, 1024).await.unwrap_err();
        assert!(matches!(
            err,
            Error::MetaNotFound {
                role: RoleName::Snapshot
            }
        ));
    }

    #[tokio::test]
    async fn test_size_cap_enforced() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemStore::new(dir.path());
        store
            .set_meta(RoleName::Targets, &vec![b'x'; 100])
            .await
            .unwrap();
        let err = store.get_meta(RoleName::Targets, 99).await.unwrap_err();
        assert!(matches!(err, Error::MetaTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_set_meta_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemStore::new(dir.path());
        store.set_meta(RoleName::Root, b"one").await.unwrap();
        store.set_meta(RoleName::Root, b"two").await.unwrap();
        assert_eq!(store.get_meta(RoleName::Root, 16).await.unwrap(), b"two");
    }
}
