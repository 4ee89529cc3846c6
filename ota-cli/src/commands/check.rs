//! `ota check`: report what an update would change.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ota_core::ReconciliationResult;

/// Arguments for `ota check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl CheckArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load_config(config_path)?;
        let mut updater = super::updater(config)?;
        let result = updater.check().context("check failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
        print_result(&result);
        Ok(())
    }
}

fn print_result(result: &ReconciliationResult) {
    if result.is_empty() {
        println!("✓ already up to date");
        return;
    }
    println!("{} change(s) available:", result.total());
    for changed in &result.changed {
        let marker = if changed.local_sha1.is_some() { "~" } else { "+" };
        println!("  {} {}", marker.yellow(), changed.path);
    }
    for dir in &result.added_dirs {
        println!("  {} {}/", "+".green(), dir);
    }
    for file in &result.deleted_files {
        println!("  {} {}", "-".red(), file);
    }
    for dir in &result.deleted_dirs {
        println!("  {} {}/", "-".red(), dir);
    }
}
