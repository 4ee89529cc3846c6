//! # ota-sync
//!
//! Reconciles a local file tree with a directory of a remote Git repository
//! and applies the difference in a fixed, crash-aware order.
//!
//! Build an [`Updater`] from an [`ota_core::OtaConfig`] and a [`Transport`],
//! then call [`Updater::check`] to see what differs or [`Updater::update`]
//! to make the local tree match.

pub mod apply;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod fsops;
pub mod hash;
pub mod manifest;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod staging;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use apply::{ApplyReport, ApplyState};
pub use error::{CommitStep, SyncError};
pub use pipeline::{UpdateOutcome, Updater};
pub use progress::{BoxError, Phase, ProgressFn, Reporter};
pub use session::Session;
pub use transport::{Response, Transport, UreqTransport};
