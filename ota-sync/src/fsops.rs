//! Filesystem helpers with explicit recursion bounds.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use ota_core::PathKind;

use crate::error::{io_err, SyncError};

/// Nesting limit for recursive removal.
pub const TREE_DEPTH_LIMIT: usize = 128;

/// Stat `path`, following symlinks. `None` when it does not exist or is
/// neither a regular file nor a directory.
pub fn kind_of(path: &Path) -> Result<Option<PathKind>, SyncError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(Some(PathKind::Directory)),
        Ok(meta) if meta.is_file() => Ok(Some(PathKind::File)),
        Ok(_) => Ok(None),
        // A file where a parent directory should be also means "absent".
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Whether anything exists at `path`.
pub fn exists(path: &Path) -> Result<bool, SyncError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Remove a directory and everything below it, descending at most
/// `max_depth` levels. Exceeding the limit fails before the offending
/// subtree is touched.
pub fn remove_tree(path: &Path, max_depth: usize) -> Result<(), std::io::Error> {
    if max_depth == 0 {
        return Err(std::io::Error::other(format!(
            "directory nesting below {} exceeds the removal limit",
            path.display()
        )));
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let child = entry.path();
        if entry.file_type()?.is_dir() {
            remove_tree(&child, max_depth - 1)?;
        } else {
            fs::remove_file(&child)?;
        }
    }
    fs::remove_dir(path)
}

/// Move a file to `dst`, creating missing parent directories. Falls back to
/// copy + remove when a plain rename is refused (e.g. staging on another
/// filesystem).
pub fn move_file(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                "rename {} -> {} failed ({rename_err}); copying instead",
                src.display(),
                dst.display()
            );
            fs::copy(src, dst)?;
            fs::remove_file(src)
        }
    }
}
