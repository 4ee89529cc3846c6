//! `ota update`: apply the remote tree to the local one.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use ota_sync::UpdateOutcome;

/// Arguments for `ota update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {}

impl UpdateArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load_config(config_path)?;
        let root = config.local_root.clone();
        let mut updater = super::updater(config)?;

        match updater.update().context("update failed")? {
            UpdateOutcome::UpToDate => println!("✓ already up to date"),
            UpdateOutcome::Applied(report) => {
                println!("✓ updated {}", root.display());
                println!(
                    "  {} file(s) replaced, {} file(s) deleted, {} dir(s) created, {} dir(s) deleted",
                    report.files_moved, report.files_deleted, report.dirs_created, report.dirs_deleted
                );
            }
        }
        Ok(())
    }
}
