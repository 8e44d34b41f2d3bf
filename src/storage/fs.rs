use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

use super::{validate_key, BlobReader, BlobStore, StorageError, StorageResult};

/// Blobs stored as files below a root directory; keys map to relative paths.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Create the parent of `path` and return a unique sibling to write into
    /// before the final rename, so readers never see a partial blob.
    async fn staging_path(&self, key: &str, path: &Path) -> StorageResult<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(key, e))?;
        }
        Ok(path.with_file_name(format!(
            "{}.tmp.{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Uuid::new_v4()
        )))
    }

    async fn commit(&self, key: &str, temp_path: &Path, path: &Path) -> StorageResult<()> {
        if let Err(e) = fs::rename(temp_path, path).await {
            let _ = fs::remove_file(temp_path).await;
            return Err(StorageError::io(key, e));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn open_read(&self, key: &str, offset: u64) -> StorageResult<BlobReader> {
        let path = self.key_path(key)?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::io(key, e))?;

        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(|e| StorageError::io(key, e))?;
        }

        Ok(Box::pin(file))
    }

    async fn upload(&self, key: &str, body: Bytes) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let temp_path = self.staging_path(key, &path).await?;

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        file.write_all(&body)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        file.sync_all().await.map_err(|e| StorageError::io(key, e))?;
        drop(file);

        self.commit(key, &temp_path, &path).await?;
        tracing::debug!(key = %key, size = body.len(), "blob written");
        Ok(())
    }

    async fn upload_file(&self, key: &str, source: &Path) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let temp_path = self.staging_path(key, &path).await?;

        let size = fs::copy(source, &temp_path)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        let file = fs::File::open(&temp_path)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        file.sync_all().await.map_err(|e| StorageError::io(key, e))?;
        drop(file);

        self.commit(key, &temp_path, &path).await?;
        tracing::debug!(key = %key, size, "blob copied");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}
