//! CLI argument definitions for barsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Download bars for every configured symbol and timeframe into the warehouse |
//! | `bars` | Print stored bars for one pair |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `barsync.toml` | Configuration file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Refresh the most recent buckets configured under [fetch]
//! barsync sync
//!
//! # Walk back through the full history of every configured symbol
//! barsync --config prod.toml sync --fetch-all
//!
//! # Inspect what was stored
//! barsync bars BTC --quote USD --timeframe 1h --limit 48 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Historical OHLCV ingestion into a local DuckDB warehouse.
#[derive(Debug, Parser)]
#[command(
    name = "barsync",
    author,
    version,
    about = "Historical OHLCV ingestion into a local DuckDB warehouse"
)]
pub struct Cli {
    /// Configuration file (TOML). Defaults to ./barsync.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch bars for every configured symbol at 1h, 1d and 1m and upsert them.
    ///
    /// # Examples
    ///
    ///   barsync sync
    ///   barsync sync --fetch-all
    Sync(SyncArgs),

    /// Query stored bars for one pair, oldest first.
    ///
    /// # Examples
    ///
    ///   barsync bars BTC
    ///   barsync bars ETH --quote USDT --timeframe 1m --limit 120
    Bars(BarsArgs),
}

/// Arguments for the `sync` command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Backfill the entire available history instead of the configured limits.
    #[arg(long, default_value_t = false)]
    pub fetch_all: bool,
}

/// Arguments for the `bars` command.
#[derive(Debug, Args)]
pub struct BarsArgs {
    /// Base asset symbol (e.g., BTC).
    pub symbol: String,

    /// Quote currency. Defaults to `fetch.vs_currency` from the configuration.
    #[arg(long)]
    pub quote: Option<String>,

    /// Bar timeframe: 1m, 1h or 1d.
    #[arg(long, default_value = "1h")]
    pub timeframe: String,

    /// Maximum number of bars to return.
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
}
