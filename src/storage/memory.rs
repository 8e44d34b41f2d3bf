use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{validate_key, BlobReader, BlobStore, StorageError, StorageResult};

/// Process-local blob store. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open_read(&self, key: &str, offset: u64) -> StorageResult<BlobReader> {
        let body = self
            .blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(body.len());
        Ok(Box::pin(Cursor::new(body.slice(start..))))
    }

    async fn upload(&self, key: &str, body: Bytes) -> StorageResult<()> {
        validate_key(key)?;
        self.blobs.write().await.insert(key.to_string(), body);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
