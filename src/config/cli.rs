//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// simpulse - device-fleet simulator
#[derive(Parser, Debug)]
#[command(name = "simpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Bus connection config file (JSON)
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Device fleet file (JSON array of device records)
    #[arg(long, default_value = "devices.json")]
    pub devices: PathBuf,

    /// Distribution registry file (JSON map of named distributions)
    #[arg(long, default_value = "distributions.json")]
    pub distributions: PathBuf,

    /// Session identifier (random if omitted)
    ///
    /// All session topics are namespaced by this id; a controller must use
    /// the same id to reach the fleet.
    #[arg(long)]
    pub session_id: Option<String>,

    /// Log level filter (e.g. "info", "simpulse=debug")
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Validate configuration and exit without starting the fleet
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
