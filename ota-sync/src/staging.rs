//! Staging area: fetched bytes mirrored under their relative paths until the
//! commit moves them into the live tree.
//!
//! The directory is disposable. Nothing left in it by an interrupted run is
//! ever trusted; every fresh check starts by clearing it.

use std::fs;
use std::path::{Path, PathBuf};

use ota_core::RelativePath;

use crate::error::{io_err, SyncError};
use crate::fsops;

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the staged copy of `path` lives.
    pub fn path_for(&self, path: &RelativePath) -> PathBuf {
        path.to_path(&self.root)
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the staging root if needed.
    pub fn ensure(&self) -> Result<(), SyncError> {
        fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))
    }

    /// Drop one staged file, e.g. after it turned out to match the local copy.
    /// A missing file is not an error.
    pub fn discard(&self, path: &RelativePath) -> Result<(), SyncError> {
        let staged = self.path_for(path);
        match fs::remove_file(&staged) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(staged, e)),
        }
    }

    /// Remove the whole staging directory. Returns `false` when there was
    /// nothing to remove.
    pub fn clear(&self) -> Result<bool, SyncError> {
        if !fsops::exists(&self.root)? {
            return Ok(false);
        }
        fsops::remove_tree(&self.root, fsops::TREE_DEPTH_LIMIT)
            .map_err(|e| io_err(&self.root, e))?;
        tracing::debug!("cleared staging area {}", self.root.display());
        Ok(true)
    }
}
