//! CLI argument definitions for Trendsig.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Classify symbols and group them by signal status |
//! | `refresh` | Refresh symbols (or the whole watchlist) and report new signals |
//! | `watchlist` | Manage the grouped symbol watchlist |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$TRENDSIG_HOME/cache/series.duckdb` | Database file path |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--offline` | `false` | Use deterministic fixture data instead of the network |
//!
//! # Examples
//!
//! ```bash
//! # Scan a few symbols over six months
//! trendsig scan AAPL MSFT macro:^VIX
//!
//! # Refresh the whole watchlist, two seconds between provider calls
//! trendsig refresh --min-interval-ms 2000
//!
//! # Manage the watchlist
//! trendsig watchlist add tech AAPL MSFT
//! trendsig watchlist list
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use trendsig_core::FetchWindow;

/// Trendsig - incremental trend-signal scanner
///
/// Caches daily market series in a local DuckDB store, refreshes only the
/// missing days, and classifies each series with an EMA crossover signal.
#[derive(Debug, Parser)]
#[command(
    name = "trendsig",
    author,
    version,
    about = "Incremental trend-signal scanner"
)]
pub struct Cli {
    /// Path to the DuckDB database file.
    ///
    /// Defaults to `$TRENDSIG_HOME/cache/series.duckdb`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve deterministic fixture data instead of calling the network.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify symbols and group them by signal status.
    ///
    /// Symbols are series ids (`equity:AAPL`, `macro:^VIX`, `rate:DFF`);
    /// a bare code is treated as an equity.
    ///
    /// # Examples
    ///
    ///   trendsig scan AAPL MSFT
    ///   trendsig scan macro:^VIX rate:DFF --window 1y --pretty
    Scan(ScanArgs),

    /// Refresh symbols and report crossovers not seen before.
    ///
    /// Without symbols the whole watchlist is refreshed.
    ///
    /// # Examples
    ///
    ///   trendsig refresh
    ///   trendsig refresh AAPL --window 3mo --jobs 2
    Refresh(RefreshArgs),

    /// Manage the grouped symbol watchlist.
    Watchlist(WatchlistArgs),
}

/// Arguments for the `scan` command.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// One or more series ids or bare equity codes.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Lookback window (1mo, 3mo, 6mo, 1y, 2y).
    #[arg(long, default_value_t = FetchWindow::SixMonths)]
    pub window: FetchWindow,

    /// Minimum milliseconds between provider calls.
    #[arg(long, default_value_t = 0)]
    pub min_interval_ms: u64,
}

/// Arguments for the `refresh` command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Series ids to refresh; the watchlist when omitted.
    #[arg(num_args = 0..)]
    pub symbols: Vec<String>,

    /// Lookback window (1mo, 3mo, 6mo, 1y, 2y).
    #[arg(long, default_value_t = FetchWindow::SixMonths)]
    pub window: FetchWindow,

    /// Minimum milliseconds between provider calls.
    #[arg(long, default_value_t = 2000)]
    pub min_interval_ms: u64,

    /// Maximum concurrent series refreshes.
    #[arg(long, default_value_t = 4)]
    pub jobs: usize,
}

/// Arguments for the `watchlist` command group.
#[derive(Debug, Args)]
pub struct WatchlistArgs {
    #[command(subcommand)]
    pub command: WatchlistCommand,
}

/// Watchlist management subcommands.
#[derive(Debug, Subcommand)]
pub enum WatchlistCommand {
    /// List every group with its symbols.
    List,

    /// List only the group names.
    Groups,

    /// Add symbols to a group, creating it if needed.
    Add(WatchlistEditArgs),

    /// Remove symbols from a group; an emptied group is dropped.
    Remove(WatchlistEditArgs),
}

/// Arguments for `watchlist add` and `watchlist remove`.
#[derive(Debug, Args)]
pub struct WatchlistEditArgs {
    /// Group name.
    pub group: String,

    /// Series ids or bare equity codes.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}
