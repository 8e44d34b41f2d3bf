use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::{clean_path, FileInfo, FileSystem, FsError, VfsFile};

/// Filesystem backed by a directory on local disk.
///
/// There is no manifest, so the content hash is a weak validator built from
/// size and modification time.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> (String, PathBuf) {
        let cleaned = clean_path(path);
        let full = self.root.join(cleaned.trim_start_matches('/'));
        (cleaned, full)
    }
}

fn map_io(path: &str, err: io::Error) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
        _ => FsError::read(path, err),
    }
}

fn weak_hash(size: u64, modified: std::time::SystemTime) -> String {
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}-{:x}", size, nanos)
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let (cleaned, full) = self.resolve(path);
        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| map_io(&cleaned, e))?;

        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let mod_time: DateTime<Utc> = modified.into();

        if metadata.is_dir() {
            return Ok(FileInfo::directory(mod_time));
        }

        Ok(FileInfo {
            is_dir: false,
            mod_time,
            size: metadata.len(),
            content_type: mime_guess::from_path(&full)
                .first_or_octet_stream()
                .to_string(),
            hash: weak_hash(metadata.len(), modified),
        })
    }

    async fn open(&self, path: &str) -> Result<VfsFile, FsError> {
        let (cleaned, full) = self.resolve(path);
        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| map_io(&cleaned, e))?;
        if metadata.is_dir() {
            return Err(FsError::IsDirectory(cleaned));
        }

        let file = tokio::fs::File::open(&full)
            .await
            .map_err(|e| map_io(&cleaned, e))?;
        Ok(Box::pin(file))
    }
}
