//! Command-line interface definitions for dupescan.
//!
//! Global options (verbosity, config file, error format) come first, then
//! the `scan-dir` subcommand with one override per pipeline knob.
//!
//! # Example
//!
//! ```bash
//! # Only list the files under two roots
//! dupescan scan-dir ~/Photos /mnt/backup
//!
//! # Find duplicates, skipping node_modules anywhere and one absolute tree
//! dupescan sd ~/src -d -e node_modules -e /home/me/src/vendor
//!
//! # Read the path list from another tool and use the external sort
//! find / -xdev -type f | dupescan scan-dir --paths-from - --strategy sort
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{ExtractStrategy, PipelineConfig};
use crate::scanner::WalkerConfig;

/// Streaming duplicate file finder for path lists larger than memory.
///
/// dupescan narrows candidates by size, hashes only files whose size is
/// shared (BLAKE3, truncated), and groups files sharing a hash and size.
/// Every intermediate result lives in files, so memory stays bounded by the
/// number of distinct sizes and duplicate keys, not by the number of paths.
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

    /// Configuration file (TOML) to load instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print errors as JSON objects on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk directories and write the path list; with -d, find duplicates
    #[command(visible_alias = "sd")]
    ScanDir(ScanDirArgs),
}

/// Arguments for the scan-dir subcommand.
#[derive(Debug, Args)]
pub struct ScanDirArgs {
    /// Directories to scan
    #[arg(value_name = "DIR", required_unless_present = "paths_from")]
    pub dirs: Vec<PathBuf>,

    /// Run duplicate detection after listing the files
    #[arg(short, long)]
    pub duplicates: bool,

    /// Directory to leave out (repeatable)
    ///
    /// A bare name such as `node_modules` matches a directory of that name
    /// at any depth; an absolute path excludes that tree only.
    #[arg(short, long, value_name = "DIR")]
    pub exclude: Vec<String>,

    /// Read line-delimited paths from FILE ('-' for stdin) instead of walking
    ///
    /// Implies --duplicates.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dirs", "exclude"])]
    pub paths_from: Option<PathBuf>,

    /// Directory for the path list, intermediate files and reports
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// How the final report is produced
    #[arg(long, value_enum)]
    pub strategy: Option<ExtractStrategy>,

    /// Format of the result printed on stdout
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Follow symbolic links during the walk
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Maximum number of files being hashed at once
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Bytes per read while hashing (e.g., 64KiB, 1MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub read_chunk_size: Option<u64>,

    /// Hex characters kept from each content hash (8-64)
    #[arg(long, value_name = "N")]
    pub hash_width: Option<usize>,

    /// Records per in-memory chunk of the external sort
    #[arg(long, value_name = "N")]
    pub sort_chunk_lines: Option<usize>,

    /// Lines buffered per output file before producers block
    #[arg(long, value_name = "N")]
    pub write_queue_capacity: Option<usize>,

    /// Minimum time between progress log lines, in milliseconds
    #[arg(long, value_name = "MS")]
    pub progress_interval_ms: Option<u64>,

    /// Keep sizes, hashes and duplicates files after a successful run
    #[arg(long, conflicts_with = "discard_intermediate")]
    pub keep_intermediate: bool,

    /// Remove sizes, hashes and duplicates files after a successful run
    #[arg(long)]
    pub discard_intermediate: bool,
}

impl ScanDirArgs {
    /// Whether the duplicate pipeline runs.
    #[must_use]
    pub fn wants_duplicates(&self) -> bool {
        self.duplicates || self.paths_from.is_some()
    }

    /// Walker settings from the flags.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            exclude: self.exclude.clone(),
        }
    }

    /// Overlay the flags that were given on a loaded pipeline config.
    pub fn apply_overrides(&self, pipeline: &mut PipelineConfig) {
        if let Some(n) = self.max_in_flight {
            pipeline.max_in_flight = n;
        }
        if let Some(n) = self.io_threads {
            pipeline.io_threads = n;
        }
        if let Some(bytes) = self.read_chunk_size {
            pipeline.read_chunk_size = usize::try_from(bytes).unwrap_or(usize::MAX);
        }
        if let Some(n) = self.hash_width {
            pipeline.hash_width = n;
        }
        if let Some(n) = self.sort_chunk_lines {
            pipeline.sort_chunk_lines = n;
        }
        if let Some(n) = self.write_queue_capacity {
            pipeline.write_queue_capacity = n;
        }
        if let Some(ms) = self.progress_interval_ms {
            pipeline.progress_interval_ms = ms;
        }
        if let Some(strategy) = self.strategy {
            pipeline.strategy = strategy;
        }
        if self.keep_intermediate {
            pipeline.keep_intermediate = true;
        } else if self.discard_intermediate {
            pipeline.keep_intermediate = false;
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON document with groups and summary
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
/// use dupescan::cli::parse_size;
///
/// assert_eq!(parse_size("65536").unwrap(), 65536);
/// assert_eq!(parse_size("64KiB").unwrap(), 65536);
/// assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// or has an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

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
