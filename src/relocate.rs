//! The move primitive shared by apply and rollback.
//!
//! A relocation is a plain `rename` when source and destination live on the
//! same filesystem. Across filesystems it degrades to copy-then-delete: the
//! content is staged in a temporary file next to the destination, synced,
//! linked into place without clobbering, and only then is the source removed.
//! An interruption can leave both copies behind but never neither.
//!
//! Callers check that the destination is free before relocating. On the
//! rename path that check is the only guard, so a file appearing in the
//! destination between check and rename would be replaced.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// How a file ended up at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateMethod {
    /// Atomic same-filesystem rename.
    Renamed,
    /// Cross-filesystem copy followed by removal of the source.
    Copied,
}

/// Capability to move one file to a new path.
pub trait Relocator {
    fn relocate(&self, source: &Path, destination: &Path) -> io::Result<RelocateMethod>;
}

/// [`Relocator`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRelocator;

impl Relocator for FsRelocator {
    fn relocate(&self, source: &Path, destination: &Path) -> io::Result<RelocateMethod> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(RelocateMethod::Renamed),
            Err(e) if is_cross_device(&e) => {
                debug!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "rename crosses devices, falling back to copy"
                );
                copy_then_remove(source, destination)?;
                Ok(RelocateMethod::Copied)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18)
}

/// Copies `source` into place at `destination`, then removes `source`.
///
/// Fails without touching the source if `destination` already exists.
pub(crate) fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let parent = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();

    let mut staged = NamedTempFile::new_in(parent)?;
    io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().set_permissions(permissions)?;
    staged.as_file().sync_all()?;
    staged.persist_noclobber(destination).map_err(|e| e.error)?;

    fs::remove_file(source)
}

/// Returns true if anything, including a dangling symlink, sits at `path`.
pub fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Creates the parent directory of `path` and any missing ancestors.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
