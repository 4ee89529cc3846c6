//! Process-wide check state: the last successful result and when it was
//! produced, used to skip a second network round-trip right after a check.

use std::time::Duration;

use chrono::{DateTime, Utc};

use ota_core::{ReconciliationResult, VerifyStrategy};

/// Owned by the [`crate::pipeline::Updater`] and passed by reference into
/// check and apply. Starts empty; filled by a successful check; invalidated
/// whenever staged content is discarded or consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    last_check: Option<DateTime<Utc>>,
    last_result: Option<ReconciliationResult>,
    strategy: Option<VerifyStrategy>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: ReconciliationResult, strategy: VerifyStrategy, at: DateTime<Utc>) {
        self.last_check = Some(at);
        self.last_result = Some(result);
        self.strategy = Some(strategy);
    }

    pub fn invalidate(&mut self) {
        self.last_check = None;
        self.last_result = None;
        self.strategy = None;
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    pub fn last_result(&self) -> Option<&ReconciliationResult> {
        self.last_result.as_ref()
    }

    /// The recorded result, if it may be applied without checking again.
    ///
    /// A result younger than `window` is always reusable. A cache-then-verify
    /// result stays reusable past the window as long as its staged content
    /// is still on disk: the staged files are a consistent snapshot of the
    /// tree that was checked.
    pub fn reusable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        staging_present: bool,
    ) -> Option<&ReconciliationResult> {
        let checked_at = self.last_check?;
        let result = self.last_result.as_ref()?;
        let age = now.signed_duration_since(checked_at);
        // Negative ages (clock stepped back) fail `to_std` and count as stale.
        let fresh = age.to_std().map(|a| a <= window).unwrap_or(false);
        if fresh {
            return Some(result);
        }
        let staged_snapshot = self.strategy == Some(VerifyStrategy::CacheThenVerify)
            && (staging_present || result.changed.is_empty());
        staged_snapshot.then_some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ota_core::{ChangedFile, RelativePath};

    fn result_with_change() -> ReconciliationResult {
        ReconciliationResult {
            changed: vec![ChangedFile {
                path: RelativePath::new("main.py"),
                sha1: "abc".into(),
                local_sha1: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn empty_session_has_nothing_to_reuse() {
        let session = Session::new();
        assert!(session
            .reusable(Utc::now(), Duration::from_secs(180), true)
            .is_none());
    }

    #[test]
    fn result_within_window_is_reused() {
        let mut session = Session::new();
        let t0 = Utc::now();
        session.record(result_with_change(), VerifyStrategy::VerifyThenFetch, t0);
        let later = t0 + chrono::Duration::seconds(179);
        assert!(session.reusable(later, Duration::from_secs(180), false).is_some());
    }

    #[test]
    fn verify_then_fetch_result_expires() {
        let mut session = Session::new();
        let t0 = Utc::now();
        session.record(result_with_change(), VerifyStrategy::VerifyThenFetch, t0);
        let later = t0 + chrono::Duration::seconds(181);
        assert!(session.reusable(later, Duration::from_secs(180), true).is_none());
    }

    #[test]
    fn cached_result_outlives_window_only_with_staging() {
        let mut session = Session::new();
        let t0 = Utc::now();
        session.record(result_with_change(), VerifyStrategy::CacheThenVerify, t0);
        let later = t0 + chrono::Duration::hours(2);
        assert!(session.reusable(later, Duration::from_secs(180), true).is_some());
        assert!(session.reusable(later, Duration::from_secs(180), false).is_none());
    }

    #[test]
    fn clock_going_backwards_is_not_fresh() {
        let mut session = Session::new();
        let t0 = Utc::now();
        session.record(result_with_change(), VerifyStrategy::VerifyThenFetch, t0);
        let earlier = t0 - chrono::Duration::seconds(10);
        assert!(session.reusable(earlier, Duration::from_secs(180), false).is_none());
    }
}
