//! dupescan - streaming duplicate file detection
//!
//! Finds duplicate files among path lists far larger than memory. Every
//! stage reads one file line by line and writes the next, so only the
//! distinct sizes and the duplicate keys are ever held in memory.
//!
//! Pipeline: walk (or an external path list) → size classification →
//! bounded-concurrency hashing of size candidates → duplicate-key filter →
//! seek extraction or external merge sort into the final report.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod io;
pub mod logging;
pub mod output;
pub mod progress;
pub mod records;
pub mod scanner;
pub mod signal;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, OutputFormat, ScanDirArgs};
use crate::config::Config;
use crate::duplicates::{DuplicateFinder, FinderConfig};
use crate::error::ExitCode;
use crate::output::{write_listing_text, write_report_streamed, write_scan_text, JsonListing};
use crate::progress::Progress;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for bad configuration, bad roots, structural pipeline
/// failures, and interruption ([`duplicates::FinderError::Interrupted`]).
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::ScanDir(args) => scan_dir(config, &args, cli.quiet),
    }
}

fn scan_dir(mut config: Config, args: &ScanDirArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    args.apply_overrides(&mut config.pipeline);
    if let Some(ref dir) = args.output_dir {
        config.output_dir = Some(dir.clone());
    }
    config
        .pipeline
        .validate()
        .context("Invalid pipeline setting")?;

    let handler = signal::install_handler().context("Failed to install Ctrl+C handler")?;
    let finder_config = FinderConfig::from_config(&config)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(quiet)));
    let finder = DuplicateFinder::new(finder_config);
    log::debug!("Output directory: {}", finder.config().output_dir.display());

    let mut stdout = std::io::stdout().lock();

    if !args.wants_duplicates() {
        let listing = finder.list_paths(&args.dirs, args.walker_config())?;
        match args.output {
            OutputFormat::Text => write_listing_text(&mut stdout, &listing)?,
            OutputFormat::Json => JsonListing::new(&listing).write_to(&mut stdout, true)?,
        }
        return Ok(if listing.stats.skipped > 0 {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        });
    }

    let report = match args.paths_from {
        Some(ref source) if source.as_os_str() == "-" => {
            log::info!("Reading path list from stdin");
            finder.find_duplicates_from_path_list(std::io::stdin().lock())?
        }
        Some(ref source) => {
            let input = open_path_list(source, config.pipeline.read_chunk_size)?;
            finder.find_duplicates_from_path_list(input)?
        }
        None => finder.find_duplicates_in_paths(&args.dirs, args.walker_config())?,
    };

    let exit_code = ExitCode::for_summary(&report.summary);
    match args.output {
        OutputFormat::Text => write_scan_text(&mut stdout, &report)?,
        OutputFormat::Json => {
            write_report_streamed(
                &mut stdout,
                report.groups()?,
                &report.summary,
                &report.report_path,
                exit_code,
            )?;
        }
    }
    Ok(exit_code)
}

fn open_path_list(path: &std::path::Path, capacity: usize) -> anyhow::Result<impl BufRead> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open path list {}", path.display()))?;
    Ok(BufReader::with_capacity(capacity, file))
}
