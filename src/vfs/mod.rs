//! Read-only virtual filesystem
//!
//! Sites are served from a [`FileSystem`], which hides where the bytes live:
//! - [`ManifestFs`]: an uploaded deployment (manifest + blob store)
//! - [`LocalFs`]: a directory on local disk
//! - [`SubFs`]: a view rooted at a sub-directory of another filesystem
//!
//! Paths are absolute and `/`-separated; every implementation cleans them
//! with [`clean_path`] first.

mod local;
mod manifest;
mod sub;

pub use local::LocalFs;
pub use manifest::{ManifestFile, ManifestFs};
pub use sub::SubFs;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("read error for {path}: {message}")]
    Read { path: String, message: String },
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    pub(crate) fn read(path: &str, err: impl fmt::Display) -> Self {
        FsError::Read {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// Metadata of one file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    pub size: u64,
    /// Empty for directories
    pub content_type: String,
    /// Stable content identifier; empty for directories
    pub hash: String,
}

impl FileInfo {
    pub fn directory(mod_time: DateTime<Utc>) -> Self {
        Self {
            is_dir: true,
            mod_time,
            size: 0,
            content_type: String::new(),
            hash: String::new(),
        }
    }
}

pub trait AsyncReadSeek: AsyncRead + AsyncSeek {}

impl<T: AsyncRead + AsyncSeek + ?Sized> AsyncReadSeek for T {}

/// Open file handle
pub type VfsFile = Pin<Box<dyn AsyncReadSeek + Send>>;

#[async_trait]
pub trait FileSystem: Send + Sync + fmt::Debug {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError>;

    /// Open a regular file. Directories yield [`FsError::IsDirectory`].
    async fn open(&self, path: &str) -> Result<VfsFile, FsError>;
}

/// Normalize a request path: always absolute, no `.`/`..` segments, no
/// duplicate or trailing slashes. `..` never climbs above `/`.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Parent of a cleaned path; `None` for `/`.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => Some("/"),
    }
}

/// Read a whole file into memory.
pub async fn read_to_bytes(fs: &dyn FileSystem, path: &str) -> Result<Bytes, FsError> {
    let mut file = fs.open(path).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            _ => FsError::read(path, e),
        })?;
    Ok(Bytes::from(buf))
}
