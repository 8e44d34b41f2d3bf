//! Response bodies
//!
//! Generated pages and cacheable files are buffered. Files the content cache
//! would never keep are streamed from the site's filesystem in
//! [`STREAM_CHUNK_SIZE`] chunks, so serving them costs one chunk of memory
//! per request rather than the whole file.

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use tokio::io::AsyncReadExt;

use crate::constants::STREAM_CHUNK_SIZE;
use crate::vfs::VfsFile;

pub enum Body {
    Full(Bytes),
    Stream(FileStream),
}

/// `len` bytes of an open file, from its current position
pub struct FileStream {
    file: VfsFile,
    remaining: u64,
}

impl FileStream {
    pub fn new(file: VfsFile, len: u64) -> Self {
        Self {
            file,
            remaining: len,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Next chunk, or `None` once every byte was produced. A file that ends
    /// early is an `UnexpectedEof` error.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let want = self.remaining.min(STREAM_CHUNK_SIZE as u64) as usize;
        let mut buf = BytesMut::zeroed(want);
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended {} bytes early", self.remaining),
            ));
        }
        buf.truncate(n);
        self.remaining -= n as u64;
        Ok(Some(buf.freeze()))
    }
}

impl Body {
    pub fn empty() -> Self {
        Body::Full(Bytes::new())
    }

    /// Bytes still to be sent
    pub fn len(&self) -> u64 {
        match self {
            Body::Full(bytes) => bytes.len() as u64,
            Body::Stream(stream) => stream.remaining(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// The buffered bytes; `None` for a streamed body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }

    /// Next piece to write. A buffered body is a single chunk.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        match self {
            Body::Full(bytes) if bytes.is_empty() => Ok(None),
            Body::Full(bytes) => Ok(Some(std::mem::take(bytes))),
            Body::Stream(stream) => stream.next_chunk().await,
        }
    }

    /// Read the whole body into memory.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Body::Full(bytes) => Ok(bytes),
            Body::Stream(mut stream) => {
                let mut out = BytesMut::new();
                while let Some(chunk) = stream.next_chunk().await? {
                    out.extend_from_slice(&chunk);
                }
                Ok(out.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(Bytes::from(bytes))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Body::Stream(stream) => f
                .debug_struct("Stream")
                .field("remaining", &stream.remaining)
                .finish_non_exhaustive(),
        }
    }
}
