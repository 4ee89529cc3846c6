//! Update applier: stage every changed file, then commit the whole
//! reconciliation result to the live tree.
//!
//! ## State machine
//!
//! ```text
//! Idle → Staging → Committing → Done
//!           ⤷ Failed (live tree untouched, staging kept for inspection)
//!                        ⤷ Failed (PartialTree: tree inconsistent, no rollback)
//! ```
//!
//! ## Commit order
//!
//! 1. Create missing `added_dirs` (parents first).
//! 2. Delete existing `deleted_files`.
//! 3. Recursively delete existing `deleted_dirs`.
//! 4. Move staged files into place, creating parents as needed.
//!
//! New directories exist before any file is moved into them, and stale
//! entries are gone before a new entry of the same name arrives.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use ota_core::{PathKind, ReconciliationResult, RelativePath, VerifyStrategy};

use crate::error::{io_err, CommitStep, SyncError};
use crate::fetch::ContentFetcher;
use crate::fsops;
use crate::hash;
use crate::progress::{Phase, Reporter};
use crate::staging::StagingArea;
use crate::transport::Transport;

/// Where an apply currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    Idle,
    Staging,
    Committing,
    Done,
    Failed,
}

/// What a successful commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub dirs_created: usize,
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub files_moved: usize,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.dirs_created + self.files_deleted + self.dirs_deleted + self.files_moved
    }
}

/// Applies one [`ReconciliationResult`] to the tree at `local_root`.
pub struct Applier<'a, T: Transport> {
    local_root: &'a Path,
    staging: &'a StagingArea,
    fetcher: &'a ContentFetcher<'a, T>,
    strategy: VerifyStrategy,
    verify_retries: u32,
    state: ApplyState,
}

impl<'a, T: Transport> Applier<'a, T> {
    pub fn new(
        local_root: &'a Path,
        staging: &'a StagingArea,
        fetcher: &'a ContentFetcher<'a, T>,
        strategy: VerifyStrategy,
        verify_retries: u32,
    ) -> Self {
        Self {
            local_root,
            staging,
            fetcher,
            strategy,
            verify_retries,
            state: ApplyState::Idle,
        }
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Stage, then commit. On success the staging area is cleared.
    pub fn apply(
        &mut self,
        result: &ReconciliationResult,
        reporter: &mut Reporter,
    ) -> Result<ApplyReport, SyncError> {
        self.state = ApplyState::Staging;
        if let Err(err) = self.stage(result, reporter) {
            self.state = ApplyState::Failed;
            tracing::error!("staging failed, nothing applied: {err}");
            return Err(err);
        }

        self.state = ApplyState::Committing;
        tracing::warn!("updating files, do not power off");
        let report = match self.commit(result) {
            Ok(report) => report,
            Err(err) => {
                self.state = ApplyState::Failed;
                tracing::error!("commit failed: {err}");
                return Err(err);
            }
        };
        tracing::info!(
            "update committed: {} dir(s) created, {} file(s) deleted, {} dir(s) deleted, {} file(s) replaced",
            report.dirs_created,
            report.files_deleted,
            report.dirs_deleted,
            report.files_moved
        );

        if let Err(err) = self.staging.clear() {
            tracing::warn!("update applied but staging cleanup failed: {err}");
        }
        self.state = ApplyState::Done;
        reporter.finish(Phase::Applying, result.changed.len());
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    /// Make sure every changed file sits in staging with its recorded hash.
    /// Touches nothing outside the staging area.
    fn stage(&self, result: &ReconciliationResult, reporter: &mut Reporter) -> Result<(), SyncError> {
        for changed in &result.changed {
            let live = changed.path.to_path(self.local_root);
            let current = local_hash(&live)?;
            if current != changed.local_sha1 {
                return Err(SyncError::LocalDrift {
                    path: changed.path.clone(),
                });
            }
        }

        self.staging.ensure()?;
        let total = result.changed.len();
        for (index, changed) in result.changed.iter().enumerate() {
            reporter.report(Phase::Applying, index, total);
            let dest = self.staging.path_for(&changed.path);
            match self.strategy {
                VerifyStrategy::CacheThenVerify => {
                    match hash::hash_file(&dest)? {
                        Some(staged) if staged == changed.sha1 => continue,
                        Some(_) => tracing::warn!("staged copy of {} is corrupt, fetching again", changed.path),
                        None => tracing::warn!("staged copy of {} is missing, fetching again", changed.path),
                    }
                    self.fetcher
                        .fetch_verified(&changed.path, &dest, &changed.sha1, self.verify_retries)?;
                }
                VerifyStrategy::VerifyThenFetch => {
                    self.fetcher
                        .fetch_verified(&changed.path, &dest, &changed.sha1, self.verify_retries)?;
                }
            }
            tracing::debug!("staged {}", changed.path);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Committing
    // -----------------------------------------------------------------------

    fn commit(&self, result: &ReconciliationResult) -> Result<ApplyReport, SyncError> {
        let mut log = CommitLog::default();

        // 1. Directories, parents first. A file squatting on a new directory's
        //    name is removed here when it is scheduled for deletion anyway.
        let doomed_files: BTreeSet<&RelativePath> = result.deleted_files.iter().collect();
        for dir in sorted(&result.added_dirs) {
            let path = dir.to_path(self.local_root);
            match log.stat(CommitStep::CreateDirs, &path)? {
                Some(PathKind::Directory) => continue,
                Some(PathKind::File) if doomed_files.contains(dir) => {
                    log.mutate(CommitStep::CreateDirs, &path, || fs::remove_file(&path))?;
                    log.report.files_deleted += 1;
                }
                _ => {}
            }
            log.mutate(CommitStep::CreateDirs, &path, || fs::create_dir_all(&path))?;
            log.report.dirs_created += 1;
        }

        // 2. Obsolete files.
        for file in sorted(&result.deleted_files) {
            let path = file.to_path(self.local_root);
            if log.stat(CommitStep::DeleteFiles, &path)? != Some(PathKind::File) {
                continue;
            }
            log.mutate(CommitStep::DeleteFiles, &path, || fs::remove_file(&path))?;
            log.report.files_deleted += 1;
        }

        // 3. Obsolete directories; a parent's removal takes its children along.
        for dir in sorted(&result.deleted_dirs) {
            let path = dir.to_path(self.local_root);
            if log.stat(CommitStep::DeleteDirs, &path)? != Some(PathKind::Directory) {
                continue;
            }
            log.mutate(CommitStep::DeleteDirs, &path, || {
                fsops::remove_tree(&path, fsops::TREE_DEPTH_LIMIT)
            })?;
            log.report.dirs_deleted += 1;
        }

        // 4. Staged content.
        for changed in &result.changed {
            let src = self.staging.path_for(&changed.path);
            let dst = changed.path.to_path(self.local_root);
            log.mutate(CommitStep::MoveFiles, &dst, || fsops::move_file(&src, &dst))?;
            log.report.files_moved += 1;
        }

        Ok(log.report)
    }
}

/// Commit bookkeeping. The tree counts as touched from the moment the first
/// mutating call is issued: `remove_tree`, `create_dir_all` and the copy
/// fallback of `move_file` can all fail halfway through.
#[derive(Default)]
struct CommitLog {
    report: ApplyReport,
    touched: bool,
}

impl CommitLog {
    fn mutate(
        &mut self,
        step: CommitStep,
        path: &Path,
        op: impl FnOnce() -> io::Result<()>,
    ) -> Result<(), SyncError> {
        self.touched = true;
        op().map_err(|source| self.fail(step, path, source))
    }

    fn stat(&self, step: CommitStep, path: &Path) -> Result<Option<PathKind>, SyncError> {
        fsops::kind_of(path).map_err(|err| match err {
            SyncError::Io { source, .. } => self.fail(step, path, source),
            other => other,
        })
    }

    /// `Io` while the live tree is untouched, `PartialTree` afterwards.
    fn fail(&self, step: CommitStep, path: &Path, source: io::Error) -> SyncError {
        if !self.touched {
            return io_err(path, source);
        }
        SyncError::PartialTree {
            step,
            path: path.to_path_buf(),
            completed: self.report.total(),
            source,
        }
    }
}

/// SHA-1 of a live file; `None` when nothing (or a directory) is there.
pub(crate) fn local_hash(path: &Path) -> Result<Option<String>, SyncError> {
    match fsops::kind_of(path)? {
        Some(PathKind::File) => hash::hash_file(path),
        _ => Ok(None),
    }
}

fn sorted(paths: &[RelativePath]) -> Vec<&RelativePath> {
    let mut out: Vec<&RelativePath> = paths.iter().collect();
    out.sort();
    out
}
