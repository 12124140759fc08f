//! Seek-based extraction.
//!
//! For every duplicate key, in report order, the extractor opens a fresh
//! handle on the hash file, seeks to the offset where the filter first saw
//! that key, and scans forward until the known number of members has been
//! collected. Each key becomes one block of the formatted report:
//!
//! ```text
//! <hash> <size>
//!   <path>
//!   <path>
//! ```
//!
//! Blocks are separated by nothing; a header line never starts with a
//! space, a member line always does.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use super::filter::{DuplicateHashSet, KeyTally};
use super::finder::{FinderConfig, FinderError};
use crate::io::{ResumableLineReader, WriteHandle, WriteQueue};
use crate::progress::{percent, phase, ProgressThrottle};
use crate::records::{line_has_hash_prefix, DupKey, HashRecord};

/// Indent of member lines in the formatted report.
pub const MEMBER_INDENT: &str = "  ";

/// Lines scanned for one key between shutdown checks.
const SHUTDOWN_CHECK_LINES: u64 = 4096;

/// Statistics from seek extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Keys written as blocks
    pub keys: u64,
    /// Member paths written
    pub records: u64,
    /// Hash-file lines examined across all scans
    pub lines_scanned: u64,
    /// Times the report writer was full
    pub backpressure_events: u64,
}

/// Writes grouped blocks by rescanning the hash file per key.
pub struct SeekExtractor<'a> {
    config: &'a FinderConfig,
}

impl<'a> SeekExtractor<'a> {
    /// Create an extractor.
    #[must_use]
    pub fn new(config: &'a FinderConfig) -> Self {
        Self { config }
    }

    /// Write one block per duplicate key of `duplicates` to `report`.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Inconsistent`] if the hash file ends before a
    ///   key's members are all found
    /// - [`FinderError::Corrupt`] if a matching line is malformed
    /// - [`FinderError::Writer`] if the report cannot be written
    /// - [`FinderError::Interrupted`] if shutdown was requested
    pub fn extract(
        &self,
        hash_file: &Path,
        duplicates: &DuplicateHashSet,
        report: &Path,
    ) -> Result<ExtractStats, FinderError> {
        let queue = WriteQueue::create(report, self.config.pipeline.write_queue_capacity)?;
        let out = queue.handle();
        let throttle = ProgressThrottle::new(self.config.pipeline.progress_interval());
        let keys = duplicates.sorted_keys();
        let total = keys.len() as u64;
        let mut stats = ExtractStats::default();

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase::EXTRACT, total);
        }
        log::info!(
            "Extracting {} duplicate groups ({} files) into {}",
            total,
            duplicates.total_records(),
            report.display()
        );

        for (key, tally) in &keys {
            if self.config.is_shutdown_requested() {
                log::info!("Extraction: Interrupted by shutdown signal");
                drop(out);
                queue.finish()?;
                return Err(FinderError::Interrupted);
            }

            self.extract_key(hash_file, key, tally, &out, &mut stats)?;
            stats.keys += 1;

            if throttle.ready() {
                log::info!(
                    "Extracting: {:.1}% ({}/{} groups)",
                    percent(stats.keys, total),
                    stats.keys,
                    total
                );
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(phase::EXTRACT, stats.keys);
                }
            }
        }

        drop(out);
        stats.backpressure_events = queue.finish()?.backpressure_events;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase::EXTRACT);
        }
        log::info!(
            "Extraction complete: {} groups, {} files, {} lines scanned",
            stats.keys,
            stats.records,
            stats.lines_scanned
        );
        Ok(stats)
    }

    fn extract_key(
        &self,
        hash_file: &Path,
        key: &DupKey,
        tally: &KeyTally,
        out: &WriteHandle,
        stats: &mut ExtractStats,
    ) -> Result<(), FinderError> {
        let io_err = |source| FinderError::IoWithPath {
            path: hash_file.to_path_buf(),
            source,
        };
        let mut file = File::open(hash_file).map_err(io_err)?;
        file.seek(SeekFrom::Start(tally.first_offset))
            .map_err(io_err)?;
        let mut reader = ResumableLineReader::new(BufReader::with_capacity(
            self.config.pipeline.read_chunk_size,
            file,
        ));

        out.write_line(key.to_string())?;
        let mut found = 0u64;
        let mut scanned = 0u64;
        while found < tally.count {
            if scanned % SHUTDOWN_CHECK_LINES == 0 && self.config.is_shutdown_requested() {
                log::info!("Extraction: Interrupted by shutdown signal while scanning for {}", key);
                return Err(FinderError::Interrupted);
            }
            scanned += 1;
            let Some(line) = reader.next_line().map_err(io_err)? else {
                break;
            };
            stats.lines_scanned += 1;
            if !line_has_hash_prefix(line.text, &key.hash) {
                continue;
            }
            let record = HashRecord::parse(line.text).map_err(|source| FinderError::Corrupt {
                file: hash_file.to_path_buf(),
                line: tally.first_line + line.number - 1,
                source,
            })?;
            if record.matches(key) {
                out.write_line(format!("{MEMBER_INDENT}{}", record.path))?;
                found += 1;
            }
        }
        stats.records += found;

        if found < tally.count {
            return Err(FinderError::Inconsistent(format!(
                "{} ended after {} of {} records for {}",
                hash_file.display(),
                found,
                tally.count,
                key
            )));
        }
        Ok(())
    }
}
