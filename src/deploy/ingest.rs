use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

use super::{extract, DeployError, DeployLimits, Manifest};
use crate::storage::BlobStore;

/// A file whose bytes matched its manifest entry, spooled to local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedFile {
    pub path: String,
    pub size: u64,
    pub spool: PathBuf,
}

/// Every file of a verified archive. The staging directory holding the
/// spooled bodies is removed when this is dropped.
#[derive(Debug)]
pub struct VerifiedUpload {
    staging: TempDir,
    pub files: Vec<VerifiedFile>,
}

impl VerifiedUpload {
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// Outcome of a successful ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub bytes: u64,
}

struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Extract the archive and check every file's SHA-256 against the manifest.
///
/// Entries are hashed while they are copied to a staging directory, so
/// memory use does not grow with the deployment. Nothing is returned unless
/// the whole archive verified.
pub fn verify_upload<R: Read>(
    manifest: &Manifest,
    reader: R,
    limits: &DeployLimits,
) -> Result<VerifiedUpload, DeployError> {
    let staging = tempfile::Builder::new()
        .prefix("siteedge-ingest-")
        .tempdir()?;
    let mut files = Vec::with_capacity(manifest.file_count());

    extract(manifest, reader, limits, |entry, data| {
        let spool = staging.path().join(format!("{:06}", files.len()));
        let mut writer = HashingWriter {
            inner: BufWriter::new(File::create(&spool)?),
            hasher: Sha256::new(),
        };
        let size = io::copy(data, &mut writer)?;
        writer.flush()?;

        let actual = hex::encode(writer.hasher.finalize());
        if actual != entry.hash {
            return Err(DeployError::HashMismatch {
                path: entry.path.clone(),
                expected: entry.hash.clone(),
                actual,
            });
        }

        files.push(VerifiedFile {
            path: entry.path.clone(),
            size,
            spool,
        });
        Ok(())
    })?;

    Ok(VerifiedUpload { staging, files })
}

/// Verify an uploaded archive and store its files under `prefix + path`.
///
/// Extraction runs on the blocking pool. Any error aborts before a single
/// blob is written, so a deployment is only reported uploaded when every
/// file is in place.
pub async fn ingest<R>(
    manifest: &Manifest,
    reader: R,
    limits: DeployLimits,
    store: Arc<dyn BlobStore>,
    prefix: &str,
) -> Result<IngestReport, DeployError>
where
    R: Read + Send + 'static,
{
    let owned = manifest.clone();
    let verified = tokio::task::spawn_blocking(move || verify_upload(&owned, reader, &limits))
        .await
        .map_err(|e| DeployError::Io(format!("extraction task failed: {}", e)))??;

    let mut report = IngestReport { files: 0, bytes: 0 };
    for file in &verified.files {
        let key = format!("{}{}", prefix, file.path);
        store.upload_file(&key, &file.spool).await?;
        debug!(key = %key, size = file.size, backend = store.kind(), "stored deployment file");
        report.files += 1;
        report.bytes += file.size;
    }

    info!(
        prefix = %prefix,
        files = report.files,
        bytes = report.bytes,
        "deployment ingested"
    );
    Ok(report)
}
