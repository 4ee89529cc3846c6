//! `ota clear`: drop staged downloads.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for `ota clear`.
#[derive(Args, Debug)]
pub struct ClearArgs {}

impl ClearArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load_config(config_path)?;
        let staging = config.cache_dir();
        let mut updater = super::updater(config)?;

        if updater.clear().context("failed to clear staging area")? {
            println!("✓ removed {}", staging.display());
        } else {
            println!("✓ nothing to clear");
        }
        Ok(())
    }
}
