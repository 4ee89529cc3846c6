//! Check and update entrypoints used by the CLI.
//!
//! An [`Updater`] owns everything one device needs between calls: the
//! configuration, the transport, the staging area and the [`Session`] that
//! lets an update reuse a recent check.

use chrono::{DateTime, Utc};

use ota_core::{OtaConfig, ReconciliationResult, VerifyStrategy};

use crate::apply::{local_hash, Applier, ApplyReport};
use crate::error::SyncError;
use crate::fetch::ContentFetcher;
use crate::filter::PathFilter;
use crate::manifest::{collect_local, collect_remote, LocalScan, RemoteScan};
use crate::progress::{Phase, Reporter};
use crate::reconcile::{compare_hashes, reconcile, Comparison};
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::staging::StagingArea;
use crate::transport::Transport;

/// Result of [`Updater::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Local tree already matches the remote.
    UpToDate,
    /// Changes were committed.
    Applied(ApplyReport),
}

pub struct Updater<T: Transport> {
    config: OtaConfig,
    transport: T,
    session: Session,
    reporter: Reporter,
    staging: StagingArea,
}

impl<T: Transport> Updater<T> {
    /// Fails with [`SyncError::Config`] before any I/O when the config is
    /// invalid.
    pub fn new(config: OtaConfig, transport: T) -> Result<Self, SyncError> {
        config.validate()?;
        let staging = StagingArea::new(config.cache_dir());
        Ok(Self {
            config,
            transport,
            session: Session::new(),
            reporter: Reporter::silent(),
            staging,
        })
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Compare the local tree with the remote one.
    pub fn check(&mut self) -> Result<ReconciliationResult, SyncError> {
        self.check_at(Utc::now())
    }

    /// [`Updater::check`] with an explicit clock reading for the session.
    ///
    /// Staging and the session are reset first, so nothing from an earlier
    /// (possibly interrupted) run is trusted. On success the result is
    /// recorded in the session; under cache-then-verify the changed files
    /// are left staged.
    pub fn check_at(&mut self, now: DateTime<Utc>) -> Result<ReconciliationResult, SyncError> {
        self.session.invalidate();
        self.staging.clear()?;
        self.reporter.report(Phase::Preparing, 20, 100);

        let config = &self.config;
        let filter = PathFilter::from_config(config);
        let scope = config.scope();
        let skip = config.cache_relative();
        let local = collect_local(&LocalScan {
            root: &config.local_root,
            scope: &scope,
            filter: &filter,
            max_depth: config.walk_depth,
            skip: skip.as_ref(),
        })?;
        self.reporter.report(Phase::Preparing, 40, 100);

        let api_url = config.api_url();
        let remote_root = config.remote_root_path();
        self.reporter.report(Phase::Preparing, 60, 100);
        let remote = collect_remote(
            &self.transport,
            &RemoteScan {
                api_url: &api_url,
                headers: &config.headers,
                remote_root: &remote_root,
                filter: &filter,
                policy: RetryPolicy::new(config.retry.api_attempts, config.api_backoff()),
            },
        )?;
        self.reporter.report(Phase::Preparing, 80, 100);
        tracing::info!(
            "comparing {} remote file(s) against {}",
            remote.files.len(),
            config.local_root.display()
        );
        self.reporter.report(Phase::Preparing, 100, 100);

        let raw_root = config.raw_root();
        let fetcher = ContentFetcher::new(
            &self.transport,
            &raw_root,
            &config.headers,
            config.retry.download_retries,
        );
        let strategy = config.strategy;
        if strategy == VerifyStrategy::CacheThenVerify {
            self.staging.ensure()?;
        }

        let staging = &self.staging;
        let reporter = &mut self.reporter;
        let result = reconcile(&local, &remote, |path, index, total| {
            reporter.report(Phase::Checking, index, total);
            let local_sha1 = local_hash(&path.to_path(&config.local_root))?;
            match strategy {
                VerifyStrategy::CacheThenVerify => {
                    let remote_sha1 = fetcher.download(path, &staging.path_for(path))?;
                    let comparison = compare_hashes(remote_sha1, local_sha1);
                    if comparison == Comparison::Unchanged {
                        staging.discard(path)?;
                    }
                    Ok(comparison)
                }
                VerifyStrategy::VerifyThenFetch => {
                    Ok(compare_hashes(fetcher.remote_hash(path)?, local_sha1))
                }
            }
        });
        let result = match result {
            Ok(result) => result.sorted(),
            Err(err) => {
                tracing::error!("check failed: {err}");
                return Err(err);
            }
        };
        self.reporter.finish(Phase::Checking, remote.files.len());

        if result.is_empty() {
            self.staging.clear()?;
            tracing::info!("already up to date");
        } else {
            tracing::info!(
                "{} change(s): {} file(s) to fetch, {} file(s) and {} dir(s) to delete, {} dir(s) to create",
                result.total(),
                result.changed.len(),
                result.deleted_files.len(),
                result.deleted_dirs.len(),
                result.added_dirs.len()
            );
        }
        self.session.record(result.clone(), strategy, now);
        Ok(result)
    }

    /// Bring the local tree in line with the remote.
    pub fn update(&mut self) -> Result<UpdateOutcome, SyncError> {
        self.update_at(Utc::now())
    }

    /// [`Updater::update`] with an explicit clock reading.
    ///
    /// Reuses the session's result when it is still valid, otherwise checks
    /// first. The session is invalidated after every apply attempt.
    pub fn update_at(&mut self, now: DateTime<Utc>) -> Result<UpdateOutcome, SyncError> {
        let reused = self
            .session
            .reusable(now, self.config.recheck_window(), self.staging.exists())
            .cloned();
        let result = match reused {
            Some(result) => {
                tracing::info!("reusing check result from this session");
                result
            }
            None => self.check_at(now)?,
        };
        if result.is_empty() {
            return Ok(UpdateOutcome::UpToDate);
        }

        let raw_root = self.config.raw_root();
        let fetcher = ContentFetcher::new(
            &self.transport,
            &raw_root,
            &self.config.headers,
            self.config.retry.download_retries,
        );
        let mut applier = Applier::new(
            &self.config.local_root,
            &self.staging,
            &fetcher,
            self.config.strategy,
            self.config.retry.verify_retries,
        );
        let outcome = applier.apply(&result, &mut self.reporter);
        self.session.invalidate();
        outcome.map(UpdateOutcome::Applied)
    }

    /// Discard staged content and the session. Returns whether a staging
    /// directory existed.
    pub fn clear(&mut self) -> Result<bool, SyncError> {
        self.session.invalidate();
        self.staging.clear()
    }
}
