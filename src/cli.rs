//! Command-line interface definitions.
//!
//! ```bash
//! # Group everything under ~/Downloads by content
//! dupescan scan ~/Downloads
//!
//! # Machine-readable report, eight workers, stop at the first error
//! dupescan scan ~/Downloads --output json --io-threads 8 --strict
//!
//! # Fingerprint individual files
//! dupescan hash a.iso b.iso
//! ```

use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;

/// Concurrent duplicate file finder.
///
/// Files are grouped by a BLAKE3 fingerprint built from per-chunk digests,
/// so two files share a group exactly when their bytes are identical.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE", env = "DUPESCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory tree for files with identical content
    Scan(ScanArgs),
    /// Print the fingerprint of individual files
    Hash(HashArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Worker threads for traversal and hashing
    ///
    /// Also bounds how many files are open at once.
    #[arg(short = 'j', long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Fingerprint chunk size (e.g., 4KiB, 64KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Hash chunks of files at least this large in parallel (e.g., 8MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub parallel_threshold: Option<u64>,

    /// Never hash chunks of a single file in parallel
    #[arg(long, conflicts_with = "parallel_threshold")]
    pub no_parallel_chunks: bool,

    /// Minimum file size to consider (e.g., 1KB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Gitignore-style patterns to skip (repeatable)
    #[arg(short = 'i', long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links
    ///
    /// Directory cycles are detected and reported, not followed.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Stop at the first unreadable path instead of collecting errors
    #[arg(long)]
    pub strict: bool,

    /// Include files that have no duplicate in the report
    #[arg(short = 'a', long = "all")]
    pub show_all: bool,

    /// Do not draw the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Write the effective configuration to FILE as TOML before scanning
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,
}

impl ScanArgs {
    /// Apply command-line overrides on top of a loaded configuration.
    ///
    /// Boolean flags can only switch a setting on.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(threads) = self.io_threads {
            config.io_threads = threads;
        }
        if let Some(chunk) = self.chunk_size {
            config.chunk_size = usize::try_from(chunk).unwrap_or(usize::MAX);
        }
        if let Some(threshold) = self.parallel_threshold {
            config.parallel_threshold = Some(threshold);
        }
        if self.no_parallel_chunks {
            config.parallel_threshold = None;
        }
        if self.min_size.is_some() {
            config.min_size = self.min_size;
        }
        if self.max_size.is_some() {
            config.max_size = self.max_size;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
        config.follow_symlinks |= self.follow_symlinks;
        config.skip_hidden |= self.skip_hidden;
        config.strict |= self.strict;
        config.show_all |= self.show_all;
    }
}

/// Arguments for the hash subcommand.
#[derive(Debug, Args)]
pub struct HashArgs {
    /// Files to fingerprint
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Fingerprint chunk size (must match the scan to compare results)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable listing
    #[default]
    Text,
    /// JSON document for scripting
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

/// Parse a human-readable size into bytes.
///
/// Decimal (`KB`, `MB`) and binary (`KiB`, `MiB`) units are accepted;
/// a bare number is a byte count.
///
/// ```
/// use dupescan::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// ```
///
/// # Errors
///
/// Returns a message when the string is not a size.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    s.parse::<ByteSize>()
        .map(|size| size.0)
        .map_err(|e| format!("Invalid size '{s}': {e}"))
}
