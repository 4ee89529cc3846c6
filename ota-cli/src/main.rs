//! ota: over-the-air file tree updater.
//!
//! # Usage
//!
//! ```text
//! ota [--config PATH] init --owner <owner> --repo <repo> [--branch main] [--force]
//! ota [--config PATH] config
//! ota [--config PATH] check [--json]
//! ota [--config PATH] update
//! ota [--config PATH] clear
//! ```

mod commands;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, clear::ClearArgs, config::ConfigArgs, init::InitArgs, update::UpdateArgs,
};
use ota_core::VerifyStrategy;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ota",
    version,
    about = "Keep a local file tree in sync with a directory of a Git repository",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.ota/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a new config file.
    Init(InitArgs),

    /// Print the resolved configuration.
    Config(ConfigArgs),

    /// Compare the local tree with the remote one without changing it.
    Check(CheckArgs),

    /// Bring the local tree in line with the remote one.
    Update(UpdateArgs),

    /// Remove staged downloads.
    Clear(ClearArgs),
}

// ---------------------------------------------------------------------------
// Shared strategy argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `VerifyStrategy` from CLI args.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyArg(pub VerifyStrategy);

impl FromStr for StrategyArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cache-then-verify" | "cache" => Ok(Self(VerifyStrategy::CacheThenVerify)),
            "verify-then-fetch" | "verify" => Ok(Self(VerifyStrategy::VerifyThenFetch)),
            other => Err(format!(
                "unknown strategy '{other}'; expected: cache-then-verify, verify-then-fetch"
            )),
        }
    }
}

impl fmt::Display for StrategyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            VerifyStrategy::CacheThenVerify => write!(f, "cache-then-verify"),
            VerifyStrategy::VerifyThenFetch => write!(f, "verify-then-fetch"),
        }
    }
}

impl From<StrategyArg> for VerifyStrategy {
    fn from(s: StrategyArg) -> Self {
        s.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init(args) => args.run(config),
        Commands::Config(args) => args.run(config),
        Commands::Check(args) => args.run(config),
        Commands::Update(args) => args.run(config),
        Commands::Clear(args) => args.run(config),
    }
}

/// Log records from the engine crates reach the subscriber through its
/// `log` bridge. `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
