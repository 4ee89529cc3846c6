//! `ota init --owner <owner> --repo <repo> [--branch main] [--force]`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use ota_core::{config as core_config, OtaConfig};

use super::super::StrategyArg;

/// Write a new config file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Repository owner (user or organization).
    #[arg(long)]
    pub owner: String,

    /// Repository name.
    #[arg(long)]
    pub repo: String,

    /// Branch to track.
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Directory kept in sync.
    #[arg(long, value_name = "DIR")]
    pub local_root: Option<PathBuf>,

    /// Repository subdirectory mirrored into the local root.
    #[arg(long, value_name = "DIR")]
    pub remote_root: Option<String>,

    /// cache-then-verify | verify-then-fetch.
    #[arg(long)]
    pub strategy: Option<StrategyArg>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let path = super::resolve_path(config_path)?;
        if path.exists() && !self.force {
            bail!(
                "'{}' already exists; pass --force to overwrite it",
                path.display()
            );
        }

        let mut config = OtaConfig::new(&self.owner, &self.repo, &self.branch);
        if let Some(root) = self.local_root {
            config.local_root = root;
        }
        if let Some(remote_root) = self.remote_root {
            config.remote_root = remote_root;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        config.validate().context("invalid configuration")?;
        core_config::save_at(&path, &config)
            .with_context(|| format!("failed to write '{}'", path.display()))?;

        println!(
            "✓ Tracking {}/{}@{}",
            config.repo.owner, config.repo.name, config.repo.branch
        );
        println!("  Saved to: {}", path.display());
        Ok(())
    }
}
