//! Filesystem over an uploaded deployment
//!
//! The directory tree is derived entirely from the manifest, so `stat` never
//! touches storage. File bodies are fetched lazily: opening a file is free,
//! the blob read starts on the first `poll_read` and restarts at the new
//! offset after a seek.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::{clean_path, parent_path, FileInfo, FileSystem, FsError, VfsFile};
use crate::deploy::{Manifest, ManifestEntry};
use crate::storage::{BlobReader, BlobStore, StorageError, StorageResult};

#[derive(Debug)]
enum Node {
    Dir,
    File(ManifestEntry),
}

/// Read-only view of a deployment
pub struct ManifestFs {
    nodes: HashMap<String, Node>,
    store: Arc<dyn BlobStore>,
    prefix: String,
    uploaded_at: DateTime<Utc>,
}

impl ManifestFs {
    /// `prefix` is prepended to manifest paths to form blob keys.
    pub fn new(
        manifest: &Manifest,
        store: Arc<dyn BlobStore>,
        prefix: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        let mut nodes = HashMap::with_capacity(manifest.files.len() + 1);
        nodes.insert("/".to_string(), Node::Dir);

        for entry in &manifest.files {
            let path = clean_path(&entry.path);
            let node = if entry.is_dir() {
                Node::Dir
            } else {
                Node::File(entry.clone())
            };

            // Implied parents
            let mut parent = parent_path(&path);
            while let Some(dir) = parent {
                if nodes.contains_key(dir) {
                    break;
                }
                nodes.insert(dir.to_string(), Node::Dir);
                parent = parent_path(dir);
            }

            nodes.insert(path, node);
        }

        Self {
            nodes,
            store,
            prefix: prefix.into(),
            uploaded_at,
        }
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    fn blob_key(&self, entry: &ManifestEntry) -> String {
        format!("{}{}", self.prefix, entry.path)
    }
}

impl fmt::Debug for ManifestFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestFs")
            .field("entries", &self.nodes.len())
            .field("store", &self.store.kind())
            .field("prefix", &self.prefix)
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

#[async_trait]
impl FileSystem for ManifestFs {
    async fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let path = clean_path(path);
        match self.nodes.get(&path) {
            Some(Node::Dir) => Ok(FileInfo::directory(self.uploaded_at)),
            Some(Node::File(entry)) => Ok(FileInfo {
                is_dir: false,
                mod_time: self.uploaded_at,
                size: entry.size,
                content_type: entry.content_type.clone(),
                hash: entry.hash.clone(),
            }),
            None => Err(FsError::NotFound(path)),
        }
    }

    async fn open(&self, path: &str) -> Result<VfsFile, FsError> {
        let path = clean_path(path);
        match self.nodes.get(&path) {
            Some(Node::Dir) => Err(FsError::IsDirectory(path)),
            Some(Node::File(entry)) => Ok(Box::pin(ManifestFile::new(
                Arc::clone(&self.store),
                self.blob_key(entry),
                entry.size,
            ))),
            None => Err(FsError::NotFound(path)),
        }
    }
}

enum ReadState {
    Idle,
    Opening(BoxFuture<'static, StorageResult<BlobReader>>),
    Reading(BlobReader),
}

/// Lazily opened, seekable handle on one blob
pub struct ManifestFile {
    store: Arc<dyn BlobStore>,
    key: String,
    size: u64,
    position: u64,
    state: ReadState,
}

impl ManifestFile {
    pub fn new(store: Arc<dyn BlobStore>, key: String, size: u64) -> Self {
        Self {
            store,
            key,
            size,
            position: 0,
            state: ReadState::Idle,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether a blob stream is currently held
    pub fn is_open(&self) -> bool {
        !matches!(self.state, ReadState::Idle)
    }
}

fn storage_to_io(err: StorageError) -> io::Error {
    match err {
        StorageError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
        other => io::Error::other(other),
    }
}

impl AsyncRead for ManifestFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                ReadState::Idle => {
                    if this.position >= this.size || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let store = Arc::clone(&this.store);
                    let key = this.key.clone();
                    let offset = this.position;
                    this.state = ReadState::Opening(
                        async move { store.open_read(&key, offset).await }.boxed(),
                    );
                }
                ReadState::Opening(open) => match ready!(open.as_mut().poll(cx)) {
                    Ok(reader) => this.state = ReadState::Reading(reader),
                    Err(err) => {
                        this.state = ReadState::Idle;
                        return Poll::Ready(Err(storage_to_io(err)));
                    }
                },
                ReadState::Reading(reader) => {
                    let before = buf.filled().len();
                    ready!(reader.as_mut().poll_read(cx, buf))?;
                    this.position += (buf.filled().len() - before) as u64;
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl AsyncSeek for ManifestFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let this = self.get_mut();
        let target = match position {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => this.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => this.position.checked_add_signed(delta),
        }
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;

        if target != this.position {
            this.state = ReadState::Idle;
            this.position = target;
        }
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.position))
    }
}
