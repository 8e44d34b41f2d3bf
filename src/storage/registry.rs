//! Storage backend registry
//!
//! Storage locations are written as URLs:
//! - `file:///var/lib/siteedge/blobs`
//! - `s3://bucket/optional/prefix?endpoint=http://localhost:9000`
//! - `memory://`
//!
//! The registry is built once at startup and passed to whoever needs to open
//! a store.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{BlobStore, FsBlobStore, MemoryBlobStore, S3BlobStore, StorageError, StorageResult};

type Constructor =
    Box<dyn Fn(StorageUrl) -> BoxFuture<'static, StorageResult<Arc<dyn BlobStore>>> + Send + Sync>;

/// Parsed storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUrl {
    pub scheme: String,
    /// Everything between `scheme://` and `?`
    pub location: String,
    pub params: HashMap<String, String>,
}

impl StorageUrl {
    pub fn parse(url: &str) -> StorageResult<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| StorageError::Config(format!("missing scheme in storage URL: {}", url)))?;

        if scheme.is_empty() {
            return Err(StorageError::Config(format!(
                "missing scheme in storage URL: {}",
                url
            )));
        }

        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let params = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();

        Ok(Self {
            scheme: scheme.to_lowercase(),
            location: location.to_string(),
            params,
        })
    }

    /// `(bucket, prefix)` split of the location
    pub fn bucket_and_prefix(&self) -> (&str, &str) {
        self.location.split_once('/').unwrap_or((&self.location, ""))
    }
}

impl fmt::Display for StorageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.location)
    }
}

/// Backend constructors keyed by URL scheme
pub struct StorageRegistry {
    constructors: HashMap<String, Constructor>,
}

impl StorageRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in `file`, `s3` and `memory` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register("file", |url| {
            async move {
                let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&url.location));
                Ok(store)
            }
            .boxed()
        });

        registry.register("s3", |url| {
            async move {
                let (bucket, prefix) = url.bucket_and_prefix();
                if bucket.is_empty() {
                    return Err(StorageError::Config(format!("missing bucket in {}", url)));
                }
                let endpoint = url.params.get("endpoint").map(String::as_str);
                let store: Arc<dyn BlobStore> =
                    Arc::new(S3BlobStore::from_env(bucket, prefix, endpoint).await);
                Ok(store)
            }
            .boxed()
        });

        registry.register("memory", |_url| {
            async move {
                let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
                Ok(store)
            }
            .boxed()
        });

        registry
    }

    pub fn register<F>(&mut self, scheme: &str, constructor: F)
    where
        F: Fn(StorageUrl) -> BoxFuture<'static, StorageResult<Arc<dyn BlobStore>>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(scheme.to_lowercase(), Box::new(constructor));
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Open the store a URL points at.
    pub async fn open(&self, url: &str) -> StorageResult<Arc<dyn BlobStore>> {
        let parsed = StorageUrl::parse(url)?;
        let constructor = self.constructors.get(&parsed.scheme).ok_or_else(|| {
            StorageError::Config(format!("unsupported storage scheme: {}", parsed.scheme))
        })?;

        let store = constructor(parsed).await?;
        tracing::info!(kind = store.kind(), url = %url, "storage backend opened");
        Ok(store)
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
