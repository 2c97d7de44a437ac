//! CLI interface for ema-trader
//!
//! Provides subcommands for:
//! - `run`: Start the bot
//! - `balance`: Fetch and print balances
//! - `indicators`: Run one indicator refresh and print EMA values
//! - `trade`: Place one order by hand
//! - `config`: Show the effective configuration

mod inspect;
mod run;
mod trade;

pub use inspect::{print_config, BalanceArgs, IndicatorsArgs};
pub use run::RunArgs;
pub use trade::TradeArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ema-trader")]
#[command(about = "EMA crossover trading bot for Kraken spot markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Environment file with API credentials
    #[arg(short, long, default_value = "keys.env")]
    pub env_file: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the bot
    Run(RunArgs),
    /// Fetch and print balances
    Balance(BalanceArgs),
    /// Run one indicator refresh and print EMA values
    Indicators(IndicatorsArgs),
    /// Place one order through the trade executor
    Trade(TradeArgs),
    /// Show configuration
    Config,
}
