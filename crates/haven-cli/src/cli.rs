//! CLI argument definitions for Haven.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trend` | Monthly series for one asset |
//! | `compare` | Month-by-month comparison of several assets |
//! | `assets` | List supported assets and their plausibility bands |
//! | `denoise` | Restate an alarming headline calmly |
//! | `wisdom` | A short steadying aphorism |
//! | `letter` | A reply from your future self |
//! | `quote` | The quote of the day |
//! | `journal` | Daily investment check-ins and streak |
//! | `cache` | Manage cached results |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Never call the generation service |
//! | `--timeout-ms` | `HAVEN_TIMEOUT_MS` or `30000` | Generation request timeout |
//! | `--no-cache` | `false` | Bypass the result cache |
//!
//! # Examples
//!
//! ```bash
//! haven trend gold --years 5
//! haven compare sp500 nasdaq bitcoin --months 12 --pretty
//! haven trend btc --percent --refresh
//! haven trend gold --query "Gold futures, front month"
//! haven cache clear compare sp500 nasdaq
//! haven journal add --level 3 --note "Monthly index buy"
//! ```

use clap::{Args, Parser, Subcommand};

/// Haven - calm long-horizon market trends
#[derive(Debug, Parser)]
#[command(
    name = "haven",
    author,
    version,
    about = "Calm long-horizon market trends",
    long_about = "Haven fetches sparse price anchors from a hosted text-generation service, \
validates them against calibrated bands and expands them into monthly series. When no \
trustworthy data is available it falls back to a clearly flagged internal baseline.\n\
\n\
Use 'haven <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Run offline: no generation calls, series come from the internal baseline.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Generation request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Neither read nor write the result cache.
    #[arg(long, global = true, default_value_t = false)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Monthly series for one asset.
    ///
    /// # Examples
    ///
    ///   haven trend gold
    ///   haven trend sp500 --years 3 --percent
    Trend(TrendArgs),

    /// Compare several assets month by month, rebased to 100 by default.
    ///
    /// # Examples
    ///
    ///   haven compare sp500 nasdaq
    ///   haven compare gold bitcoin --months 24 --absolute
    Compare(CompareArgs),

    /// List supported assets.
    Assets,

    /// Restate a sensational financial headline as a calm description.
    Denoise(DenoiseArgs),

    /// A short steadying aphorism.
    Wisdom,

    /// Send a note to your future self and read the reply.
    Letter(LetterArgs),

    /// The quote of the day.
    Quote(QuoteArgs),

    /// Investment journal: one check-in per day, streak and calendar.
    ///
    /// # Examples
    ///
    ///   haven journal add --level 3 --note "Monthly index buy"
    ///   haven journal list --calendar
    ///   haven journal streak
    Journal(JournalArgs),

    /// Cache management commands.
    Cache(CacheArgs),
}

/// Arguments for the `trend` command.
#[derive(Debug, Args)]
pub struct TrendArgs {
    /// Asset identifier or alias (sp500, nasdaq, gold, bitcoin, btc, ...).
    pub asset: String,

    /// Window length in years, ending this month.
    #[arg(long, default_value_t = 5)]
    pub years: u32,

    /// Rebase the series so the first month equals 100.
    #[arg(long, default_value_t = false)]
    pub percent: bool,

    /// Describe what to price instead of the asset's built-in query,
    /// e.g. "Gold futures, front month".
    #[arg(long)]
    pub query: Option<String>,

    /// Drop any cached result for this request first.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

/// Arguments for the `compare` command.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Two or more asset identifiers.
    #[arg(required = true, num_args = 1..)]
    pub assets: Vec<String>,

    /// Window length in months, ending this month.
    #[arg(long, default_value_t = 12)]
    pub months: u32,

    /// Report absolute prices instead of rebased percentages.
    #[arg(long, default_value_t = false)]
    pub absolute: bool,

    /// Drop any cached result for this request first.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,
}

/// Arguments for the `denoise` command.
#[derive(Debug, Args)]
pub struct DenoiseArgs {
    /// The headline to restate.
    pub headline: String,
}

/// Arguments for the `letter` command.
#[derive(Debug, Args)]
pub struct LetterArgs {
    /// What you want to tell your future self.
    pub message: String,
}

/// Arguments for the `quote` command.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Date to pick the quote for (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<String>,
}

/// Arguments for the `journal` command group.
#[derive(Debug, Args)]
pub struct JournalArgs {
    #[command(subcommand)]
    pub command: JournalCommand,
}

#[derive(Debug, Subcommand)]
pub enum JournalCommand {
    /// Record a check-in. Recording the same day again replaces it.
    Add(JournalAddArgs),
    /// All check-ins, oldest first.
    List(JournalListArgs),
    /// Delete every check-in.
    Clear,
    /// Consecutive recorded days up to today (or yesterday).
    Streak(JournalStreakArgs),
}

#[derive(Debug, Args)]
pub struct JournalAddArgs {
    /// Day of the check-in (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Intensity from 0 (nothing) to 4 (full commitment).
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub level: u8,

    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Debug, Args)]
pub struct JournalListArgs {
    /// Also return the trailing-year calendar grouped by month.
    #[arg(long, default_value_t = false)]
    pub calendar: bool,

    /// Treat this day (YYYY-MM-DD) as today.
    #[arg(long)]
    pub today: Option<String>,
}

#[derive(Debug, Args)]
pub struct JournalStreakArgs {
    /// Treat this day (YYYY-MM-DD) as today.
    #[arg(long)]
    pub today: Option<String>,
}

/// Arguments for the `cache` command group.
#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Cache management subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Remove one cached result. Other entries are untouched.
    Clear(CacheClearArgs),
}

#[derive(Debug, Args)]
pub struct CacheClearArgs {
    #[command(subcommand)]
    pub target: ClearTarget,
}

#[derive(Debug, Subcommand)]
pub enum ClearTarget {
    /// Cached `trend` result.
    Trend(ClearTrendArgs),
    /// Cached `compare` result.
    Compare(ClearCompareArgs),
}

#[derive(Debug, Args)]
pub struct ClearTrendArgs {
    pub asset: String,

    #[arg(long, default_value_t = 5)]
    pub years: u32,

    /// Description the trend was fetched with, if any.
    #[arg(long)]
    pub query: Option<String>,
}

#[derive(Debug, Args)]
pub struct ClearCompareArgs {
    #[arg(required = true, num_args = 1..)]
    pub assets: Vec<String>,

    #[arg(long, default_value_t = 12)]
    pub months: u32,
}
