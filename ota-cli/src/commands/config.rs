//! `ota config`: print the resolved configuration.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Print the resolved configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {}

impl ConfigArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (path, config) = super::load_config(config_path)?;
        let yaml = serde_yaml::to_string(&config).context("failed to render configuration")?;

        println!("{} {}", "config:".bold(), path.display());
        println!("{} {}", "tree listing:".bold(), config.api_url());
        println!("{} {}", "raw content:".bold(), config.raw_root());
        println!("{} {}", "staging:".bold(), config.cache_dir().display());
        println!();
        print!("{yaml}");
        Ok(())
    }
}
