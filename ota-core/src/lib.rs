//! ota core library: domain types, configuration, errors.
//!
//! - [`types`]: relative paths, manifests, reconciliation results
//! - [`config`]: YAML configuration load / save / validate
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{OtaConfig, Provider, RepoSpec, RetryConfig, VerifyStrategy};
pub use error::ConfigError;
pub use types::{ChangedFile, Manifest, PathKind, ReconciliationResult, RelativePath, RemoteEntry};
