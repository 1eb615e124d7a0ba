//! CLI interface for strike-edge
//!
//! Provides subcommands for:
//! - `run`: Start the paper trading pipeline
//! - `config`: Show the resolved configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "strike-edge")]
#[command(about = "Paper trading bot for Polymarket rolling BTC strike markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start paper trading
    Run(RunArgs),
    /// Show the resolved configuration
    Config,
}
