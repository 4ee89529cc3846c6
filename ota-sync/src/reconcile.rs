//! Four-way diff between a local and a remote manifest.
//!
//! Set differences decide deletions and new directories. Changed files are
//! decided per remote file by a content comparison supplied by the caller,
//! so a file present on both sides with different bytes is still reported.

use ota_core::{ChangedFile, Manifest, ReconciliationResult, RelativePath};

use crate::error::SyncError;

/// The purely set-derived part of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetDiff {
    pub deleted_files: Vec<RelativePath>,
    pub added_dirs: Vec<RelativePath>,
    pub deleted_dirs: Vec<RelativePath>,
}

/// `L.files − R.files`, `R.dirs − L.dirs`, `L.dirs − R.dirs`.
pub fn diff_sets(local: &Manifest, remote: &Manifest) -> SetDiff {
    SetDiff {
        deleted_files: local.files.difference(&remote.files).cloned().collect(),
        added_dirs: remote.dirs.difference(&local.dirs).cloned().collect(),
        deleted_dirs: local.dirs.difference(&remote.dirs).cloned().collect(),
    }
}

/// Outcome of comparing one remote file with its local counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Unchanged,
    Changed {
        remote_sha1: String,
        local_sha1: Option<String>,
    },
}

/// Compute the full reconciliation.
///
/// `compare(path, index, total)` is called once for every remote file, in
/// manifest order, and decides whether it changed. The first error aborts
/// the reconciliation; no partial result is returned.
pub fn reconcile<F>(
    local: &Manifest,
    remote: &Manifest,
    mut compare: F,
) -> Result<ReconciliationResult, SyncError>
where
    F: FnMut(&RelativePath, usize, usize) -> Result<Comparison, SyncError>,
{
    let SetDiff {
        deleted_files,
        added_dirs,
        deleted_dirs,
    } = diff_sets(local, remote);

    let total = remote.files.len();
    let mut changed = Vec::new();
    for (index, path) in remote.files.iter().enumerate() {
        match compare(path, index, total)? {
            Comparison::Unchanged => {}
            Comparison::Changed {
                remote_sha1,
                local_sha1,
            } => changed.push(ChangedFile {
                path: path.clone(),
                sha1: remote_sha1,
                local_sha1,
            }),
        }
    }

    Ok(ReconciliationResult {
        changed,
        deleted_files,
        added_dirs,
        deleted_dirs,
    })
}

/// Decide a comparison from the two digests. A missing local file (`None`)
/// never matches.
pub fn compare_hashes(remote_sha1: String, local_sha1: Option<String>) -> Comparison {
    if local_sha1.as_deref() == Some(remote_sha1.as_str()) {
        Comparison::Unchanged
    } else {
        Comparison::Changed {
            remote_sha1,
            local_sha1,
        }
    }
}
