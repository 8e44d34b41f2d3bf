use async_trait::async_trait;
use std::sync::Arc;

use super::{clean_path, FileInfo, FileSystem, FsError, VfsFile};

/// View of `inner` rooted at a sub-directory
#[derive(Debug, Clone)]
pub struct SubFs {
    inner: Arc<dyn FileSystem>,
    root: String,
}

impl SubFs {
    pub fn new(inner: Arc<dyn FileSystem>, root: &str) -> Self {
        Self {
            inner,
            root: clean_path(root),
        }
    }

    /// Wrap `inner` only when `root` is not already `/`.
    pub fn wrap(inner: Arc<dyn FileSystem>, root: &str) -> Arc<dyn FileSystem> {
        let root = clean_path(root);
        if root == "/" {
            inner
        } else {
            Arc::new(Self { inner, root })
        }
    }

    fn full_path(&self, path: &str) -> String {
        let path = clean_path(path);
        if self.root == "/" {
            path
        } else if path == "/" {
            self.root.clone()
        } else {
            format!("{}{}", self.root, path)
        }
    }

    /// Rewrite errors so they name the path as seen through this view.
    fn relative_error(&self, path: &str, err: FsError) -> FsError {
        let path = clean_path(path);
        match err {
            FsError::NotFound(_) => FsError::NotFound(path),
            FsError::IsDirectory(_) => FsError::IsDirectory(path),
            other => other,
        }
    }
}

#[async_trait]
impl FileSystem for SubFs {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        self.inner
            .stat(&self.full_path(path))
            .await
            .map_err(|e| self.relative_error(path, e))
    }

    async fn open(&self, path: &str) -> Result<VfsFile, FsError> {
        self.inner
            .open(&self.full_path(path))
            .await
            .map_err(|e| self.relative_error(path, e))
    }
}
