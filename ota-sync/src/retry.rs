//! Bounded retry for transport operations.

use std::time::Duration;

use crate::error::SyncError;

/// How many times to run an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// A policy allowing `retries` extra attempts after the first, with no delay.
    pub fn with_retries(retries: u32) -> Self {
        Self::new(retries.saturating_add(1), Duration::ZERO)
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are used up. `op` receives the 1-based attempt number.
///
/// Only [`SyncError::is_transient`] failures are retried; anything else is
/// returned immediately. The last transient error is returned on exhaustion.
pub fn with_retry<T, F>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, SyncError>
where
    F: FnMut(u32) -> Result<T, SyncError>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                tracing::warn!("{label} failed (attempt {attempt}/{attempts}): {err}");
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!("{label} failed after {attempts} attempt(s): {err}");
                }
                return Err(err);
            }
        }
    }
}
