//! One-way progress notifications.
//!
//! A callback failure (error or panic) is logged and swallowed; it can never
//! change the outcome of a check or apply.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Boxed error returned by a progress callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Progress callback: `(phase, done, total)`.
pub type ProgressFn = Box<dyn FnMut(Phase, usize, usize) -> Result<(), BoxError>>;

/// Stage of the operation being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Collecting manifests.
    Preparing,
    /// Comparing content.
    Checking,
    /// Staging and committing.
    Applying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Preparing => write!(f, "preparing"),
            Phase::Checking => write!(f, "checking"),
            Phase::Applying => write!(f, "applying"),
        }
    }
}

/// Wraps an optional callback behind a catch-and-log boundary.
#[derive(Default)]
pub struct Reporter {
    callback: Option<ProgressFn>,
}

impl Reporter {
    pub fn new(callback: ProgressFn) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// A reporter that drops every notification.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&mut self, phase: Phase, done: usize, total: usize) {
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| callback(phase, done, total))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!("progress callback failed at {phase} {done}/{total}: {err}");
            }
            Err(_) => {
                tracing::error!("progress callback panicked at {phase} {done}/{total}");
            }
        }
    }

    /// Final tick of a phase. `total` is clamped to at least 1 so consumers
    /// computing percentages never divide by zero.
    pub fn finish(&mut self, phase: Phase, total: usize) {
        let total = total.max(1);
        self.report(phase, total, total);
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
