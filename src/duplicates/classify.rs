//! Size classification.
//!
//! # Overview
//!
//! The classifier reads the path source one line at a time, stats each
//! path, and appends a `<size> <path>` record to the sizes file. Sizes are
//! tallied in a [`SizeHistogram`]; once the input is exhausted the
//! histogram is reduced to the [`CandidateSizeSet`]: sizes above zero
//! shared by at least two files. Only files of a candidate size are ever
//! hashed.
//!
//! Records in the sizes file keep the order of the input paths.
//!
//! # Example
//!
//! ```
//! use dupescan::duplicates::SizeHistogram;
//!
//! let mut histogram = SizeHistogram::new();
//! for size in [10, 10, 5, 0, 0] {
//!     histogram.record(size);
//! }
//! assert_eq!(histogram.total(), 5);
//!
//! let candidates = histogram.into_candidates();
//! assert!(candidates.contains(10));
//! assert!(!candidates.contains(5));
//! assert!(!candidates.contains(0)); // empty files never collide
//! assert_eq!(candidates.file_count(), 2);
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use super::finder::{FinderConfig, FinderError};
use crate::io::{ReadSignal, ReaderState, ResumableLineReader, WriteQueue};
use crate::progress::{phase, ProgressThrottle};
use crate::records::SizeRecord;

/// Occurrence count per file size.
#[derive(Debug, Clone, Default)]
pub struct SizeHistogram {
    counts: HashMap<u64, u64>,
    total: u64,
}

impl SizeHistogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one file of `size` bytes.
    pub fn record(&mut self, size: u64) {
        *self.counts.entry(size).or_insert(0) += 1;
        self.total += 1;
    }

    /// Files counted so far.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Occurrences of `size`.
    #[must_use]
    pub fn count(&self, size: u64) -> u64 {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// Distinct sizes seen.
    #[must_use]
    pub fn distinct_sizes(&self) -> usize {
        self.counts.len()
    }

    /// Sum of all counts; always equal to [`total`](Self::total).
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Keep the sizes above zero that occur more than once.
    #[must_use]
    pub fn into_candidates(self) -> CandidateSizeSet {
        let counts: HashMap<u64, u64> = self
            .counts
            .into_iter()
            .filter(|&(size, count)| size > 0 && count > 1)
            .collect();
        CandidateSizeSet { counts }
    }
}

/// Sizes worth hashing, with their occurrence counts.
#[derive(Debug, Clone, Default)]
pub struct CandidateSizeSet {
    counts: HashMap<u64, u64>,
}

impl CandidateSizeSet {
    /// Whether files of `size` bytes must be hashed.
    #[must_use]
    pub fn contains(&self, size: u64) -> bool {
        self.counts.contains_key(&size)
    }

    /// Occurrences of a candidate size, 0 if it is not a candidate.
    #[must_use]
    pub fn count(&self, size: u64) -> u64 {
        self.counts.get(&size).copied().unwrap_or(0)
    }

    /// Number of candidate sizes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether no size is shared by two non-empty files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Files belonging to candidate sizes.
    #[must_use]
    pub fn file_count(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Counters of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifyStats {
    /// Non-blank lines read from the path source
    pub input_paths: u64,
    /// Paths stat'd successfully and written to the sizes file
    pub classified: u64,
    /// Sum of classified file sizes
    pub total_size: u64,
    /// Paths that vanished or could not be stat'd for lack of permission
    pub skipped: u64,
    /// Directories, FIFOs, sockets and devices left out
    pub non_regular: u64,
    /// Classified files of zero bytes
    pub empty_files: u64,
    /// Times the sizes writer was full
    pub backpressure_events: u64,
}

/// Result of the classification pass.
#[derive(Debug, Clone)]
pub struct ClassifyOutcome {
    /// Sizes to hash
    pub candidates: CandidateSizeSet,
    /// Files belonging to candidate sizes
    pub candidate_count: u64,
    /// The sizes file that was written
    pub sizes_file: PathBuf,
    /// Pass counters
    pub stats: ClassifyStats,
}

/// Stats path-source lines into the sizes file.
#[derive(Debug)]
pub struct SizeClassifier<'a> {
    config: &'a FinderConfig,
}

impl<'a> SizeClassifier<'a> {
    /// Create a classifier.
    #[must_use]
    pub fn new(config: &'a FinderConfig) -> Self {
        Self { config }
    }

    /// Classify every path of `input` and write `sizes_file`.
    ///
    /// Missing and unreadable paths are logged and skipped, as are
    /// non-regular files. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Stat`] for any other stat failure
    /// - [`FinderError::Writer`] if the sizes file cannot be written
    /// - [`FinderError::Interrupted`] if shutdown was requested
    pub fn classify<R: BufRead>(
        &self,
        input: R,
        sizes_file: &Path,
    ) -> Result<ClassifyOutcome, FinderError> {
        let queue = WriteQueue::create(sizes_file, self.config.pipeline.write_queue_capacity)?;
        let out = queue.handle();
        let throttle = ProgressThrottle::new(self.config.pipeline.progress_interval());

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase::CLASSIFY, 0);
        }
        log::info!("Classifying paths by size into {}", sizes_file.display());

        let mut histogram = SizeHistogram::new();
        let mut stats = ClassifyStats::default();
        let mut reader = ResumableLineReader::new(input);

        let mut on_line = |line: crate::io::Line<'_>| -> Result<ReadSignal, FinderError> {
            if self.config.is_shutdown_requested() {
                return Ok(ReadSignal::Pause);
            }
            let text = line.text.trim_end_matches('\r');
            if text.trim().is_empty() {
                return Ok(ReadSignal::Continue);
            }
            stats.input_paths += 1;

            let path = Path::new(text);
            let meta = match fs::metadata(path) {
                Ok(meta) => meta,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                    ) =>
                {
                    log::warn!("Skipping {}: {}", text, e);
                    stats.skipped += 1;
                    return Ok(ReadSignal::Continue);
                }
                Err(source) => {
                    return Err(FinderError::Stat {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            };

            if !meta.is_file() {
                log::debug!("Skipping non-regular file {}", text);
                stats.non_regular += 1;
                return Ok(ReadSignal::Continue);
            }

            let size = meta.len();
            out.write_line(SizeRecord::new(size, text).to_string())?;
            histogram.record(size);
            stats.classified += 1;
            stats.total_size += size;
            if size == 0 {
                stats.empty_files += 1;
            }

            if throttle.ready() {
                log::info!("Classified {} paths", stats.classified);
                if let Some(ref callback) = self.config.progress_callback {
                    callback.on_progress(phase::CLASSIFY, stats.input_paths);
                }
            }
            Ok(ReadSignal::Continue)
        };

        let mut interrupted = false;
        loop {
            match reader.drive(&mut on_line)? {
                ReaderState::Exhausted => break,
                ReaderState::Paused => {
                    if self.config.is_shutdown_requested() {
                        interrupted = true;
                        break;
                    }
                    reader.resume();
                }
            }
        }

        drop(out);
        let summary = queue.finish()?;
        stats.backpressure_events = summary.backpressure_events;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase::CLASSIFY);
        }
        if interrupted {
            log::info!("Classification: Interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }

        debug_assert_eq!(histogram.sum(), stats.classified);
        let distinct = histogram.distinct_sizes();
        let candidates = histogram.into_candidates();
        let candidate_count = candidates.file_count();

        log::info!(
            "Classification complete: {} files, {} distinct sizes, {} candidate sizes covering {} files, {} skipped",
            stats.classified,
            distinct,
            candidates.len(),
            candidate_count,
            stats.skipped
        );

        Ok(ClassifyOutcome {
            candidates,
            candidate_count,
            sizes_file: sizes_file.to_path_buf(),
            stats,
        })
    }
}
