//! Moving one file into a destination directory.
//!
//! The destination name is reserved with an exclusive create before any
//! data moves, so concurrent workers can never pick the same name. A
//! same-volume rename is tried first; otherwise the file is copied,
//! verified against the source content hash, and only then is the
//! source deleted. Any failure leaves the source where it was.

use crate::error::{FlowError, Result};
use crate::fingerprint;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Numeric suffixes tried before falling back to a random one
const MAX_SUFFIX: u32 = 1000;

/// Low-level file operations, swappable for fault injection
pub trait FileTransfer: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy bytes from `from` over `to`, returning bytes written
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// `std::fs` backed transfer
#[derive(Debug, Clone, Copy, Default)]
pub struct StdTransfer;

impl FileTransfer for StdTransfer {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }
}

/// Where a file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub destination: PathBuf,
    /// A numeric suffix was needed to avoid overwriting
    pub renamed: bool,
    /// Rename failed and the data was copied instead
    pub copied: bool,
}

#[derive(Clone)]
pub struct Mover {
    transfer: Arc<dyn FileTransfer>,
}

impl Default for Mover {
    fn default() -> Self {
        Self::new()
    }
}

impl Mover {
    pub fn new() -> Self {
        Self::with_transfer(Arc::new(StdTransfer))
    }

    pub fn with_transfer(transfer: Arc<dyn FileTransfer>) -> Self {
        Self { transfer }
    }

    /// Move `source` into `dest_dir`, keeping its file name when free.
    ///
    /// `expected_fingerprint` is the content hash taken when the file was
    /// discovered; a copy is only trusted if it hashes to the same value.
    pub fn move_into(
        &self,
        source: &Path,
        dest_dir: &Path,
        expected_fingerprint: Option<&str>,
    ) -> Result<MoveReport> {
        let source_meta = match fs::symlink_metadata(source) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FlowError::SourceMissing(source.to_path_buf()))
            }
            Err(e) => return Err(FlowError::move_failed(source, e.to_string())),
        };
        if !source_meta.is_file() {
            return Err(FlowError::move_failed(source, "not a regular file"));
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| FlowError::move_failed(source, "path has no file name"))?;

        fs::create_dir_all(dest_dir).map_err(|e| {
            FlowError::move_failed(
                source,
                format!("failed to create {}: {}", dest_dir.display(), e),
            )
        })?;

        let (destination, renamed) = reserve_destination(dest_dir, Path::new(file_name))
            .map_err(|e| FlowError::move_failed(source, format!("failed to reserve name: {}", e)))?;

        if self.transfer.rename(source, &destination).is_ok() {
            return Ok(MoveReport {
                destination,
                renamed,
                copied: false,
            });
        }

        // different volume or rename refused: copy, verify, then delete
        if let Err(reason) = self.copy_verified(source, &destination, source_meta.len(), expected_fingerprint) {
            return Err(FlowError::move_failed(source, self.discard_copy(source, &destination, reason)));
        }

        if let Err(e) = self.transfer.remove(source) {
            // keep exactly one authoritative copy: the original
            let reason = format!("copied but could not remove source: {}", e);
            return Err(FlowError::move_failed(source, self.discard_copy(source, &destination, reason)));
        }

        Ok(MoveReport {
            destination,
            renamed,
            copied: true,
        })
    }

    /// Remove the copy at `destination` after a failed move. Returns
    /// `reason`, extended when the copy could not be removed.
    fn discard_copy(&self, source: &Path, destination: &Path, reason: String) -> String {
        match self.transfer.remove(destination) {
            Ok(()) => reason,
            Err(e) if e.kind() == io::ErrorKind::NotFound => reason,
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    destination = %destination.display(),
                    error = %e,
                    "Could not remove copy, duplicate left behind"
                );
                format!("{}; duplicate left at {}: {}", reason, destination.display(), e)
            }
        }
    }

    fn copy_verified(
        &self,
        source: &Path,
        destination: &Path,
        expected_len: u64,
        expected_fingerprint: Option<&str>,
    ) -> std::result::Result<(), String> {
        self.transfer
            .copy(source, destination)
            .map_err(|e| format!("copy failed: {}", e))?;

        let copied_len = fs::metadata(destination)
            .map_err(|e| format!("copy vanished: {}", e))?
            .len();
        if copied_len != expected_len {
            return Err(format!(
                "incomplete copy: {} of {} bytes",
                copied_len, expected_len
            ));
        }

        let expected = match expected_fingerprint.filter(|f| fingerprint::is_content_hash(f)) {
            Some(hash) => hash.to_string(),
            None => fingerprint::sha256_file(source).map_err(|e| format!("cannot hash source: {}", e))?,
        };
        let actual =
            fingerprint::sha256_file(destination).map_err(|e| format!("cannot hash copy: {}", e))?;
        if actual != expected {
            return Err("copy does not match source content".to_string());
        }

        Ok(())
    }
}

/// Claim a free name in `dir` by creating an empty placeholder.
/// Returns the path and whether a suffix was needed.
fn reserve_destination(dir: &Path, file_name: &Path) -> io::Result<(PathBuf, bool)> {
    let original = dir.join(file_name);
    if try_create(&original)? {
        return Ok((original, false));
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=MAX_SUFFIX {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if try_create(&candidate)? {
            return Ok((candidate, true));
        }
    }

    let candidate = dir.join(format!("{}_{}{}", stem, uuid::Uuid::new_v4(), ext));
    if try_create(&candidate)? {
        return Ok((candidate, true));
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free destination name",
    ))
}

/// `Ok(false)` when the name is taken
fn try_create(path: &Path) -> io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}
