use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{validate_key, PersistenceBackend, StorageError};

/// One file per key under a root directory
///
/// Writes go to a sibling temp file, flushed to disk and then renamed into
/// place, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl PersistenceBackend for FileStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;

        let tmp_path = self.root.join(format!(".{}.tmp", key));
        let mut tmp = tokio::fs::File::create(&tmp_path).await.map_err(io_err)?;
        tmp.write_all(bytes).await.map_err(io_err)?;
        tmp.sync_all().await.map_err(io_err)?;
        drop(tmp);
        tokio::fs::rename(&tmp_path, &path).await.map_err(io_err)?;

        log::debug!("Persisted {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}
