use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::fmt;
use std::io::Cursor;
use std::path::Path;

use super::{validate_key, BlobReader, BlobStore, StorageError, StorageResult};

/// Blobs stored as objects in an S3 bucket, below an optional key prefix.
#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Build a client from the ambient AWS environment (credentials chain,
    /// `AWS_REGION`). An explicit `endpoint` switches to path-style
    /// addressing for S3-compatible services.
    pub async fn from_env(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Self {
        let shared = aws_config::load_from_env().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(S3Client::from_conf(builder.build()), bucket, prefix)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn map_error<E>(err: SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let SdkError::ServiceError(service_err) = &err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::S3 {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn open_read(&self, key: &str, offset: u64) -> StorageResult<BlobReader> {
        validate_key(key)?;

        let mut request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.object_key(key));
        if offset > 0 {
            request = request.range(format!("bytes={}-", offset));
        }

        match request.send().await {
            Ok(output) => Ok(Box::pin(output.body.into_async_read())),
            Err(SdkError::ServiceError(service_err))
                if service_err.raw().status().as_u16() == 416 =>
            {
                // Offset at or past the end of the object
                Ok(Box::pin(Cursor::new(Bytes::new())))
            }
            Err(err) => {
                let err = Self::map_error(err, key);
                if !err.is_not_found() {
                    tracing::error!(bucket = %self.bucket, key = %key, error = %err, "S3 read failed");
                }
                Err(err)
            }
        }
    }

    async fn upload(&self, key: &str, body: Bytes) -> StorageResult<()> {
        validate_key(key)?;

        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Self::map_error(e, key))?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "blob uploaded");
        Ok(())
    }

    async fn upload_file(&self, key: &str, source: &Path) -> StorageResult<()> {
        validate_key(key)?;

        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| StorageError::S3 {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(body)
            .send()
            .await
            .map_err(|e| Self::map_error(e, key))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "blob uploaded from file");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> S3Client {
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        S3Client::from_conf(config)
    }

    #[test]
    fn test_object_key_applies_prefix() {
        let store = S3BlobStore::new(offline_client(), "bucket", "/deployments/");
        assert_eq!(store.object_key("a/index.html"), "deployments/a/index.html");

        let store = S3BlobStore::new(offline_client(), "bucket", "");
        assert_eq!(store.object_key("a/index.html"), "a/index.html");
    }

    #[tokio::test]
    async fn test_rejects_invalid_key_before_request() {
        let store = S3BlobStore::new(offline_client(), "bucket", "");
        let err = store.open_read("../x", 0).await.err().unwrap();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
