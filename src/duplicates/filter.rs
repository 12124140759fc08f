//! Duplicate-hash filter.
//!
//! Streams the hash file once and tallies every `(hash, size)` key,
//! remembering where each key was first seen. Keys seen at least twice form
//! the [`DuplicateHashSet`]. Only candidate files reach the hash file and
//! true duplicates are normally a small fraction of those, so the set stays
//! small even for very large scans.
//!
//! The same set drives [`write_duplicates_file`], which copies the records
//! of duplicate keys into the input of the external sort.

use std::collections::HashMap;
use std::path::Path;

use super::finder::{FinderConfig, FinderError};
use crate::io::{Line, ReadSignal, ReaderState, ResumableLineReader, WriteQueue};
use crate::records::{DupKey, HashRecord};

/// Occurrences of one key and where it first appears in the hash file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTally {
    /// Records carrying this key
    pub count: u64,
    /// Byte offset of the first such record
    pub first_offset: u64,
    /// 1-based line number of the first such record
    pub first_line: u64,
}

/// Occurrence count per `(hash, size)` key.
#[derive(Debug, Clone, Default)]
pub struct HashHistogram {
    tallies: HashMap<DupKey, KeyTally>,
    total: u64,
}

impl HashHistogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record found at `offset` on line `line`.
    pub fn record(&mut self, key: DupKey, offset: u64, line: u64) {
        self.tallies
            .entry(key)
            .and_modify(|tally| tally.count += 1)
            .or_insert(KeyTally {
                count: 1,
                first_offset: offset,
                first_line: line,
            });
        self.total += 1;
    }

    /// Records counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    /// Whether nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Sum of every count; always equal to [`total`](Self::total).
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.tallies.values().map(|t| t.count).sum()
    }

    /// Keep the keys seen more than once.
    #[must_use]
    pub fn into_duplicates(self) -> DuplicateHashSet {
        let entries: HashMap<DupKey, KeyTally> = self
            .tallies
            .into_iter()
            .filter(|(_, tally)| tally.count > 1)
            .collect();
        let total_records = entries.values().map(|t| t.count).sum();
        DuplicateHashSet {
            entries,
            total_records,
        }
    }
}

/// Keys shared by two or more files.
#[derive(Debug, Clone, Default)]
pub struct DuplicateHashSet {
    entries: HashMap<DupKey, KeyTally>,
    total_records: u64,
}

impl DuplicateHashSet {
    /// Whether `key` is a duplicate key.
    #[must_use]
    pub fn contains(&self, key: &DupKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Tally of a duplicate key.
    #[must_use]
    pub fn get(&self, key: &DupKey) -> Option<&KeyTally> {
        self.entries.get(key)
    }

    /// Number of duplicate groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no duplicates were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records across all duplicate keys.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Bytes that removing every copy but one would free.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|(key, tally)| key.size * (tally.count - 1))
            .sum()
    }

    /// Keys in report order: size descending, then hash.
    #[must_use]
    pub fn sorted_keys(&self) -> Vec<(DupKey, KeyTally)> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .map(|(key, tally)| (key.clone(), *tally))
            .collect();
        keys.sort_by(|a, b| a.0.report_cmp(&b.0));
        keys
    }
}

/// Tally every record of `hash_file`.
///
/// # Errors
///
/// - [`FinderError::Corrupt`] if a line is not a hash record
/// - [`FinderError::Interrupted`] if shutdown was requested
pub fn build_histogram(
    hash_file: &Path,
    config: &FinderConfig,
) -> Result<HashHistogram, FinderError> {
    let mut histogram = HashHistogram::new();
    scan_records(hash_file, config, |record, line| {
        histogram.record(record.key(), line.offset, line.number);
        Ok(())
    })?;
    Ok(histogram)
}

/// Stream `hash_file` and keep the keys occurring at least twice.
///
/// # Errors
///
/// See [`build_histogram`].
pub fn filter_duplicates(
    hash_file: &Path,
    config: &FinderConfig,
) -> Result<DuplicateHashSet, FinderError> {
    let histogram = build_histogram(hash_file, config)?;
    let records = histogram.total();
    let distinct = histogram.len();
    let duplicates = histogram.into_duplicates();

    log::info!(
        "Filter complete: {} records, {} distinct keys, {} duplicate groups covering {} files",
        records,
        distinct,
        duplicates.len(),
        duplicates.total_records()
    );
    Ok(duplicates)
}

/// Copy the records of duplicate keys from `hash_file` to `out`, keeping
/// their order. Returns the number of records written.
///
/// # Errors
///
/// - [`FinderError::Corrupt`] if a line is not a hash record
/// - [`FinderError::Writer`] if `out` cannot be written
/// - [`FinderError::Inconsistent`] if the count differs from the set
/// - [`FinderError::Interrupted`] if shutdown was requested
pub fn write_duplicates_file(
    hash_file: &Path,
    duplicates: &DuplicateHashSet,
    out: &Path,
    config: &FinderConfig,
) -> Result<u64, FinderError> {
    let queue = WriteQueue::create(out, config.pipeline.write_queue_capacity)?;
    let handle = queue.handle();

    scan_records(hash_file, config, |record, _| {
        if duplicates.contains(&record.key()) {
            handle.write_line(record.to_string())?;
        }
        Ok(())
    })?;

    drop(handle);
    let written = queue.finish()?.lines;
    if written != duplicates.total_records() {
        return Err(FinderError::Inconsistent(format!(
            "{} holds {} duplicate records, expected {}",
            hash_file.display(),
            written,
            duplicates.total_records()
        )));
    }
    log::debug!("Wrote {} duplicate records to {}", written, out.display());
    Ok(written)
}

/// Parse every line of a hash-format file, stopping on shutdown.
fn scan_records<F>(path: &Path, config: &FinderConfig, mut on_record: F) -> Result<(), FinderError>
where
    F: FnMut(HashRecord, Line<'_>) -> Result<(), FinderError>,
{
    let mut reader = ResumableLineReader::open(path, config.pipeline.read_chunk_size)
        .map_err(|source| FinderError::IoWithPath {
            path: path.to_path_buf(),
            source,
        })?;

    let state = reader.drive(|line: Line<'_>| -> Result<ReadSignal, FinderError> {
        if config.is_shutdown_requested() {
            return Ok(ReadSignal::Pause);
        }
        let record = HashRecord::parse(line.text).map_err(|source| FinderError::Corrupt {
            file: path.to_path_buf(),
            line: line.number,
            source,
        })?;
        on_record(record, line)?;
        Ok(ReadSignal::Continue)
    })?;

    match state {
        ReaderState::Exhausted => Ok(()),
        ReaderState::Paused => Err(FinderError::Interrupted),
    }
}
