//! Blob storage
//!
//! Deployment files are stored as opaque blobs under a key prefix. The edge
//! only needs two operations: stream a blob from an offset (serving and
//! seeking) and upload a blob (ingestion).
//!
//! Backends:
//! - [`FsBlobStore`]: directory on local disk
//! - [`S3BlobStore`]: S3 bucket (or S3-compatible endpoint)
//! - [`MemoryBlobStore`]: process-local map
//!
//! [`StorageRegistry`] maps URL schemes to backend constructors.

mod fs;
mod memory;
mod registry;
mod s3;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use registry::{StorageRegistry, StorageUrl};
pub use s3::S3BlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Streaming body of a blob
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("S3 error for {key}: {message}")]
    S3 { key: String, message: String },

    #[error("storage configuration error: {0}")]
    Config(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return StorageError::NotFound(key.to_string());
        }
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Content-addressed blob backend
#[async_trait]
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Open `key` for reading, starting `offset` bytes in. An offset at or
    /// past the end yields an empty stream.
    async fn open_read(&self, key: &str, offset: u64) -> StorageResult<BlobReader>;

    /// Store `body` under `key`, replacing any previous blob.
    async fn upload(&self, key: &str, body: Bytes) -> StorageResult<()>;

    /// Store the contents of the local file `source` under `key`.
    ///
    /// Disk and S3 backends stream the file; the default reads it into
    /// memory and calls [`BlobStore::upload`].
    async fn upload_file(&self, key: &str, source: &Path) -> StorageResult<()> {
        let body = tokio::fs::read(source)
            .await
            .map_err(|e| StorageError::io(key, e))?;
        self.upload(key, Bytes::from(body)).await
    }

    /// Backend name for logs
    fn kind(&self) -> &'static str;
}

/// Reject keys that could escape a backend's namespace.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment == ".." || segment == ".")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Read a whole blob into memory.
pub async fn read_blob(store: &dyn BlobStore, key: &str) -> StorageResult<Bytes> {
    use tokio::io::AsyncReadExt;

    let mut reader = store.open_read(key, 0).await?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .map_err(|e| StorageError::io(key, e))?;
    Ok(Bytes::from(buf))
}
