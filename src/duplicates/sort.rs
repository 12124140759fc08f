//! External chunked merge sort of hash records.
//!
//! # Overview
//!
//! The input is read in chunks of `sort_chunk_lines` records. The line
//! callback pauses the reader whenever a chunk is full; the driver sorts
//! that chunk in memory, writes it to the next numbered `<n>.txt` file, and
//! resumes. The chunk files then form a FIFO queue: the two oldest are
//! merged line by line into a new numbered file that joins the back of the
//! queue, until one file remains. That file is renamed to the output.
//!
//! Order is size descending, then hash, then path (see
//! [`HashRecord::sort_cmp`]). Equal records are written from both sides.
//! The record count is checked after the last merge.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{ExternalSorter, FinderConfig};
//! use std::path::Path;
//!
//! let config = FinderConfig::default();
//! let stats = ExternalSorter::new(&config)
//!     .sort(
//!         Path::new("duplicates.txt"),
//!         Path::new("chunks"),
//!         Path::new("duplicates-sorted.txt"),
//!     )
//!     .unwrap();
//! println!("{} records, {} merges", stats.records, stats.merge_passes);
//! ```

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::finder::{FinderConfig, FinderError};
use super::workspace::remove_if_exists;
use crate::io::{Line, ReadSignal, ReaderState, ResumableLineReader, WriteHandle, WriteQueue};
use crate::progress::phase;
use crate::records::HashRecord;

/// Statistics from one external sort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Records read from the input
    pub records: u64,
    /// Sorted chunk files written
    pub chunks_created: u64,
    /// Two-way merges performed
    pub merge_passes: u64,
    /// Times a chunk or merge writer was full
    pub backpressure_events: u64,
}

/// Disk-backed sorter for hash-format files.
pub struct ExternalSorter<'a> {
    config: &'a FinderConfig,
}

impl<'a> ExternalSorter<'a> {
    /// Create a sorter.
    #[must_use]
    pub fn new(config: &'a FinderConfig) -> Self {
        Self { config }
    }

    /// Sort `input` into `output`, using `chunks_dir` for scratch files.
    ///
    /// An empty input produces an empty output.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Corrupt`] if a line is not a hash record
    /// - [`FinderError::Inconsistent`] if the output count differs from the input
    /// - [`FinderError::Writer`] / [`FinderError::IoWithPath`] on I/O failure
    /// - [`FinderError::Interrupted`] if shutdown was requested
    pub fn sort(
        &self,
        input: &Path,
        chunks_dir: &Path,
        output: &Path,
    ) -> Result<SortStats, FinderError> {
        fs::create_dir_all(chunks_dir).map_err(|source| FinderError::IoWithPath {
            path: chunks_dir.to_path_buf(),
            source,
        })?;
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase::SORT, 0);
        }

        let mut stats = SortStats::default();
        let mut next_id = 0u64;
        let mut queue = self.write_chunks(input, chunks_dir, &mut next_id, &mut stats)?;
        log::info!(
            "Sorting {} records: {} chunk(s) of up to {} lines",
            stats.records,
            queue.len(),
            self.config.pipeline.sort_chunk_lines
        );

        let mut final_lines = 0;
        if queue.len() == 1 {
            final_lines = stats.records;
        }
        while queue.len() > 1 {
            if self.config.is_shutdown_requested() {
                log::info!("Sort: Interrupted by shutdown signal");
                return Err(FinderError::Interrupted);
            }
            let (Some(left), Some(right)) = (queue.pop_front(), queue.pop_front()) else {
                break;
            };
            let merged = chunks_dir.join(format!("{next_id}.txt"));
            next_id += 1;

            final_lines = self.merge_pair(&left, &right, &merged, &mut stats)?;
            remove_chunk(&left)?;
            remove_chunk(&right)?;
            queue.push_back(merged);
            stats.merge_passes += 1;

            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(phase::SORT, stats.merge_passes);
            }
            log::debug!("Merge pass {}: {} queued", stats.merge_passes, queue.len());
        }

        match queue.pop_front() {
            Some(last) => {
                remove_if_exists(output).map_err(|source| FinderError::IoWithPath {
                    path: output.to_path_buf(),
                    source,
                })?;
                fs::rename(&last, output).map_err(|source| FinderError::IoWithPath {
                    path: output.to_path_buf(),
                    source,
                })?;
            }
            None => {
                File::create(output).map_err(|source| FinderError::IoWithPath {
                    path: output.to_path_buf(),
                    source,
                })?;
            }
        }

        if final_lines != stats.records {
            return Err(FinderError::Inconsistent(format!(
                "sorted output holds {} records, input had {}",
                final_lines, stats.records
            )));
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase::SORT);
        }
        log::info!(
            "Sort complete: {} records, {} chunks, {} merges",
            stats.records,
            stats.chunks_created,
            stats.merge_passes
        );
        Ok(stats)
    }

    /// Split `input` into sorted chunk files, returned oldest first.
    fn write_chunks(
        &self,
        input: &Path,
        chunks_dir: &Path,
        next_id: &mut u64,
        stats: &mut SortStats,
    ) -> Result<VecDeque<PathBuf>, FinderError> {
        let chunk_lines = self.config.pipeline.sort_chunk_lines.max(1);
        let mut reader = ResumableLineReader::open(input, self.config.pipeline.read_chunk_size)
            .map_err(|source| FinderError::IoWithPath {
                path: input.to_path_buf(),
                source,
            })?;
        let mut chunk: Vec<HashRecord> = Vec::with_capacity(chunk_lines);
        let mut queue = VecDeque::new();
        let mut records = 0u64;

        loop {
            let state = reader.drive(|line: Line<'_>| -> Result<ReadSignal, FinderError> {
                let record = HashRecord::parse(line.text).map_err(|source| {
                    FinderError::Corrupt {
                        file: input.to_path_buf(),
                        line: line.number,
                        source,
                    }
                })?;
                chunk.push(record);
                records += 1;
                if chunk.len() >= chunk_lines || self.config.is_shutdown_requested() {
                    Ok(ReadSignal::Pause)
                } else {
                    Ok(ReadSignal::Continue)
                }
            })?;

            if self.config.is_shutdown_requested() {
                log::info!("Sort: Interrupted by shutdown signal");
                return Err(FinderError::Interrupted);
            }
            if !chunk.is_empty() {
                let path = chunks_dir.join(format!("{next_id}.txt"));
                *next_id += 1;
                self.flush_chunk(&mut chunk, &path, stats)?;
                queue.push_back(path);
            }
            match state {
                ReaderState::Exhausted => break,
                ReaderState::Paused => reader.resume(),
            }
        }

        stats.records = records;
        Ok(queue)
    }

    fn flush_chunk(
        &self,
        chunk: &mut Vec<HashRecord>,
        path: &Path,
        stats: &mut SortStats,
    ) -> Result<(), FinderError> {
        chunk.sort_by(HashRecord::sort_cmp);
        let queue = WriteQueue::create(path, self.config.pipeline.write_queue_capacity)?;
        let out = queue.handle();
        for record in chunk.drain(..) {
            out.write_line(record.to_string())?;
        }
        drop(out);
        let summary = queue.finish()?;
        stats.chunks_created += 1;
        stats.backpressure_events += summary.backpressure_events;
        log::trace!("Wrote chunk {} ({} records)", path.display(), summary.lines);
        Ok(())
    }

    /// Merge two sorted files; returns the number of records written.
    fn merge_pair(
        &self,
        left: &Path,
        right: &Path,
        merged: &Path,
        stats: &mut SortStats,
    ) -> Result<u64, FinderError> {
        let mut a = MergeSide::open(left, self.config.pipeline.read_chunk_size)?;
        let mut b = MergeSide::open(right, self.config.pipeline.read_chunk_size)?;
        let queue = WriteQueue::create(merged, self.config.pipeline.write_queue_capacity)?;
        let out = queue.handle();

        loop {
            // None once both sides are drained.
            let order = match (&a.current, &b.current) {
                (Some(x), Some(y)) => Some(x.sort_cmp(y)),
                (Some(_), None) => Some(Ordering::Less),
                (None, Some(_)) => Some(Ordering::Greater),
                (None, None) => None,
            };
            match order {
                Some(Ordering::Less) => a.emit(&out)?,
                Some(Ordering::Greater) => b.emit(&out)?,
                Some(Ordering::Equal) => {
                    a.emit(&out)?;
                    b.emit(&out)?;
                }
                None => break,
            }
        }

        drop(out);
        let summary = queue.finish()?;
        stats.backpressure_events += summary.backpressure_events;
        Ok(summary.lines)
    }
}

/// One input of a two-way merge with its current record.
struct MergeSide {
    reader: ResumableLineReader<BufReader<File>>,
    path: PathBuf,
    current: Option<HashRecord>,
}

impl MergeSide {
    fn open(path: &Path, capacity: usize) -> Result<Self, FinderError> {
        let reader =
            ResumableLineReader::open(path, capacity).map_err(|source| FinderError::IoWithPath {
                path: path.to_path_buf(),
                source,
            })?;
        let mut side = Self {
            reader,
            path: path.to_path_buf(),
            current: None,
        };
        side.advance()?;
        Ok(side)
    }

    fn advance(&mut self) -> Result<(), FinderError> {
        let line = self
            .reader
            .next_line()
            .map_err(|source| FinderError::IoWithPath {
                path: self.path.clone(),
                source,
            })?;
        self.current = match line {
            Some(line) => Some(HashRecord::parse(line.text).map_err(|source| {
                FinderError::Corrupt {
                    file: self.path.clone(),
                    line: line.number,
                    source,
                }
            })?),
            None => None,
        };
        Ok(())
    }

    /// Write the current record and move to the next one.
    fn emit(&mut self, out: &WriteHandle) -> Result<(), FinderError> {
        if let Some(record) = self.current.take() {
            out.write_line(record.to_string())?;
        }
        self.advance()
    }
}

fn remove_chunk(path: &Path) -> Result<(), FinderError> {
    remove_if_exists(path)
        .map(|_| ())
        .map_err(|source| FinderError::IoWithPath {
            path: path.to_path_buf(),
            source,
        })
}
