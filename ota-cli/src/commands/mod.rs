pub mod check;
pub mod clear;
pub mod config;
pub mod init;
pub mod update;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use ota_core::{config as core_config, ConfigError, OtaConfig};
use ota_sync::{BoxError, Phase, Reporter, Updater, UreqTransport};

/// `--config` if given, else `~/.ota/config.yaml`.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => core_config::config_path().context("could not determine home directory"),
    }
}

pub fn load_config(explicit: Option<&Path>) -> Result<(PathBuf, OtaConfig)> {
    let path = resolve_path(explicit)?;
    let config = core_config::load_at(&path).map_err(|e| match e {
        ConfigError::NotFound { .. } => {
            anyhow::Error::new(e).context("no configuration found; run `ota init` first")
        }
        other => anyhow::Error::new(other).context("failed to load configuration"),
    })?;
    tracing::debug!("loaded config from {}", path.display());
    Ok((path, config))
}

/// Updater over the real network transport, printing progress to stderr.
pub fn updater(config: OtaConfig) -> Result<Updater<UreqTransport>> {
    let transport = UreqTransport::new(config.timeout());
    let updater = Updater::new(config, transport).context("invalid configuration")?;
    Ok(updater.with_reporter(progress_printer()))
}

fn progress_printer() -> Reporter {
    Reporter::new(Box::new(|phase: Phase, done: usize, total: usize| -> Result<(), BoxError> {
        let percent = if total == 0 { 100 } else { done * 100 / total };
        let label = match phase {
            Phase::Preparing => phase.to_string().blue(),
            Phase::Checking => phase.to_string().cyan(),
            Phase::Applying => phase.to_string().yellow(),
        };
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{label} {done}/{total} ({percent}%)")?;
        Ok(())
    }))
}
