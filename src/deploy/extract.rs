use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufReader, Read};
use tracing::debug;

use super::{DeployError, DeployLimits, Manifest, ManifestEntry};
use crate::constants::{
    TAR_BLOCK_SIZE, TAR_ENTRY_OVERHEAD, TAR_NAME_FIELD_LEN, TAR_PAX_RECORD_OVERHEAD,
};

const GZIP_WINDOW: usize = 32 * 1024;

#[derive(Debug)]
struct LimitExceeded;

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("decompressed archive exceeds its manifest")
    }
}

impl std::error::Error for LimitExceeded {}

/// Fails reads once more than `remaining` bytes have been produced.
struct Bounded<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for Bounded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n as u64 > self.remaining {
            return Err(io::Error::new(io::ErrorKind::Other, LimitExceeded));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn map_archive_error(e: io::Error, limit: u64) -> DeployError {
    if e.get_ref().map_or(false, |inner| inner.is::<LimitExceeded>()) {
        return DeployError::DeploymentTooLarge {
            size: limit + 1,
            max: limit,
        };
    }
    DeployError::Io(format!("malformed archive: {}", e))
}

fn round_up_to_block(n: u64) -> u64 {
    n.div_ceil(TAR_BLOCK_SIZE) * TAR_BLOCK_SIZE
}

/// Most decompressed bytes a well-formed archive of `manifest` can take.
///
/// Every entry gets a header plus padding. Paths too long for the ustar name
/// field also get a GNU long-name or PAX entry (one more header and the name
/// blocks). Two zero blocks end the archive.
pub(crate) fn archive_limit(manifest: &Manifest) -> u64 {
    let long_names: u64 = manifest
        .regular_files()
        .filter(|entry| entry.path.len() > TAR_NAME_FIELD_LEN)
        .map(|entry| {
            2 * TAR_BLOCK_SIZE + round_up_to_block(entry.path.len() as u64 + TAR_PAX_RECORD_OVERHEAD)
        })
        .sum();

    manifest.total_size() + (manifest.file_count() as u64 + 2) * TAR_ENTRY_OVERHEAD + long_names
}

/// Tar entry name as a manifest path
fn normalize(name: &str) -> String {
    name.trim_start_matches("./").trim_start_matches('/').to_string()
}

/// Walk a gzip-compressed tar archive against `manifest`.
///
/// Every regular entry must be a pending manifest file of exactly the
/// declared size; `handler` receives its byte stream. Directory and other
/// non-regular entries are skipped. Files the archive never delivered are
/// reported as [`DeployError::MissingFile`].
///
/// The limits are checked on the manifest before anything is read, and the
/// decompressed stream may not exceed [`archive_limit`].
pub fn extract<R, F>(
    manifest: &Manifest,
    reader: R,
    limits: &DeployLimits,
    mut handler: F,
) -> Result<(), DeployError>
where
    R: Read,
    F: FnMut(&ManifestEntry, &mut dyn Read) -> Result<(), DeployError>,
{
    limits.check(manifest)?;

    let mut pending: HashMap<&str, &ManifestEntry> = manifest
        .regular_files()
        .map(|entry| (entry.path.as_str(), entry))
        .collect();

    let limit = archive_limit(manifest);
    let gz = GzDecoder::new(BufReader::with_capacity(GZIP_WINDOW, reader));
    let mut archive = tar::Archive::new(Bounded {
        inner: gz,
        remaining: limit,
    });

    let entries = archive
        .entries()
        .map_err(|e| map_archive_error(e, limit))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| map_archive_error(e, limit))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = {
            let raw = entry
                .path()
                .map_err(|e| map_archive_error(e, limit))?;
            normalize(&raw.to_string_lossy())
        };

        let expected = pending
            .remove(path.as_str())
            .ok_or_else(|| DeployError::UnexpectedFile(path.clone()))?;

        let actual = entry.size();
        if actual != expected.size {
            return Err(DeployError::UnexpectedFileSize {
                path,
                expected: expected.size,
                actual,
            });
        }

        debug!(path = %path, size = actual, "extracting file");
        handler(expected, &mut entry)?;
    }

    if let Some(missing) = pending.keys().min() {
        return Err(DeployError::MissingFile(missing.to_string()));
    }
    Ok(())
}
