//! Command-line interface definitions for RustQuarantine.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, config file) apply to every subcommand.
//! Flags that mirror a configuration key only override it when given.
//!
//! # Example
//!
//! ```bash
//! # Preview which empty files would be quarantined
//! rustquarantine scan ~/projects --dry-run
//!
//! # Quarantine into a dedicated base, mirroring the directory layout
//! rustquarantine scan ~/projects --quarantine-base ~/.quarantine --preserve-structure -y
//!
//! # Undo the most recent batch
//! rustquarantine restore --quarantine-base ~/.quarantine
//!
//! # Find duplicates of at least 1 MiB and move them aside
//! rustquarantine dupes ~/photos --min-size 1MiB --move
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Reversible quarantine for empty files and duplicate content.
///
/// Every move is recorded in a per-batch journal, so any batch can be
/// restored to its original locations.
#[derive(Debug, Parser)]
#[command(name = "rustquarantine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML, JSON or YAML by extension)
    ///
    /// Defaults to config.toml in the platform config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for RustQuarantine.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Quarantine empty files under a directory
    Scan(ScanArgs),
    /// Move the files of a batch back to where they came from
    Restore(RestoreArgs),
    /// List quarantine batches
    List(ListArgs),
    /// Find duplicate files and optionally move them aside
    Dupes(DupesArgs),
    /// Run `scan` periodically until interrupted
    Watch(WatchArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Traversal flags shared by `scan`, `dupes` and `watch`.
#[derive(Debug, Clone, Default, Args)]
pub struct TraversalArgs {
    /// Include hidden files and directories (starting with .)
    #[arg(long)]
    pub include_hidden: bool,

    /// Only look at direct children of PATH
    #[arg(long)]
    pub no_recursive: bool,

    /// Mirror paths relative to PATH inside the batch instead of flattening
    #[arg(long)]
    pub preserve_structure: bool,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan for empty files
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Directory that receives the batch (default from config, else ".")
    #[arg(long, value_name = "DIR")]
    pub quarantine_base: Option<PathBuf>,

    #[command(flatten)]
    pub traversal: TraversalArgs,

    /// Show what would be moved without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the restore subcommand.
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Batch name or path (default: the most recent batch)
    #[arg(long, value_name = "NAME|PATH")]
    pub batch: Option<PathBuf>,

    /// Directory holding the batches (default from config, else ".")
    #[arg(long, value_name = "DIR")]
    pub quarantine_base: Option<PathBuf>,

    /// Show what would be restored without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the list subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Directory holding the batches (default from config, else ".")
    #[arg(long, value_name = "DIR")]
    pub quarantine_base: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the dupes subcommand.
#[derive(Debug, Args)]
pub struct DupesArgs {
    /// Directory to search for duplicates
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Move every duplicate (all but the first copy) into a batch
    #[arg(long = "move")]
    pub move_duplicates: bool,

    /// Directory that receives duplicate batches
    /// (default: <quarantine_base>/duplicates)
    #[arg(long, value_name = "DIR")]
    pub duplicates_dir: Option<PathBuf>,

    /// Quarantine base the default duplicates directory is derived from
    #[arg(long, value_name = "DIR")]
    pub quarantine_base: Option<PathBuf>,

    #[command(flatten)]
    pub traversal: TraversalArgs,

    /// Report what would be moved without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the watch subcommand.
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Directory to scan on every tick
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Minutes between scans (default from config, else 60)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_minutes: Option<u64>,

    /// Directory that receives the batches (default from config, else ".")
    #[arg(long, value_name = "DIR")]
    pub quarantine_base: Option<PathBuf>,

    #[command(flatten)]
    pub traversal: TraversalArgs,

    /// Plan every tick without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after N scheduled runs instead of waiting for Ctrl+C
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_runs: Option<u64>,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use rustquarantine::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    // Find where the number ends and the suffix begins
    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
