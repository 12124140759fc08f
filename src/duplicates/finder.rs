//! Duplicate finder pipeline orchestration.
//!
//! # Overview
//!
//! [`DuplicateFinder`] runs the stages strictly downstream, each one
//! draining its input before the next treats its output file as complete:
//!
//! 1. **Walk** (optional) - list regular files of the scan roots
//! 2. **Classify** - stat every path, keep sizes shared by 2+ files
//! 3. **Hash** - hash candidate files under a concurrency ceiling
//! 4. **Filter** - keep `(hash, size)` keys occurring 2+ times
//! 5. **Extract** - write the report with the configured strategy
//!
//! All intermediate files live in the run's output directory; see
//! [`RunWorkspace`].
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, FinderConfig};
//! use dupescan::scanner::WalkerConfig;
//! use std::path::PathBuf;
//!
//! let config = FinderConfig::default().with_output_dir(PathBuf::from("output-data"));
//! let finder = DuplicateFinder::new(config);
//!
//! let report = finder
//!     .find_duplicates_in_paths(&[PathBuf::from(".")], WalkerConfig::default())
//!     .unwrap();
//! for group in report.load_groups().unwrap() {
//!     println!("{} x{}: {} bytes each", group.hash, group.len(), group.size);
//! }
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::classify::SizeClassifier;
use super::extract::SeekExtractor;
use super::filter::{filter_duplicates, write_duplicates_file};
use super::groups::{read_groups, DuplicateGroup, ReportGroups, ReportLayout};
use super::hashing::BoundedHasher;
use super::sort::ExternalSorter;
use super::workspace::RunWorkspace;
use crate::config::{Config, ConfigError, ExtractStrategy, PipelineConfig};
use crate::io::{WriteQueue, WriteQueueError};
use crate::progress::{phase, ProgressCallback};
use crate::records::RecordError;
use crate::scanner::walker::WalkError;
use crate::scanner::{collision_probability, HashError, ScanError, WalkStats, Walker, WalkerConfig};

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Pipeline tuning knobs.
    pub pipeline: PipelineConfig,
    /// Directory receiving intermediate files and the report.
    pub output_dir: PathBuf,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("pipeline", &self.pipeline)
            .field("output_dir", &self.output_dir)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            output_dir: Config::default_output_dir(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Build a finder configuration from loaded application settings.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            pipeline: config.pipeline.clone(),
            output_dir: config.resolved_output_dir(),
            ..Self::default()
        }
    }

    /// Replace the pipeline knobs.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.pipeline.io_threads = threads.max(1);
        self
    }

    /// Set the in-flight hash ceiling.
    #[must_use]
    pub fn with_max_in_flight(mut self, ceiling: usize) -> Self {
        self.pipeline.max_in_flight = ceiling.max(1);
        self
    }

    /// Set the extraction strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ExtractStrategy) -> Self {
        self.pipeline.strategy = strategy;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PhaseTimings {
    /// Directory walk
    pub walk: Duration,
    /// Size classification
    pub classify: Duration,
    /// Hashing
    pub hash: Duration,
    /// Duplicate filter
    pub filter: Duration,
    /// Extraction or sort
    pub extract: Duration,
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Non-blank paths read from the path source
    pub input_paths: u64,
    /// Regular files stat'd successfully
    pub total_files: u64,
    /// Total size of those files in bytes
    pub total_size: u64,
    /// Files dropped with a warning (vanished, unreadable, unrepresentable)
    pub skipped_files: u64,
    /// Non-regular entries in the path source
    pub non_regular_files: u64,
    /// Files whose size was shared with another non-empty file
    pub candidate_files: u64,
    /// Files hashed
    pub hashed_files: u64,
    /// Confirmed duplicate groups
    pub duplicate_groups: u64,
    /// Duplicate files, excluding one original per group
    pub duplicate_files: u64,
    /// Bytes freed by keeping one file per group
    pub reclaimable_space: u64,
    /// Most hash operations in flight at once
    pub peak_in_flight: usize,
    /// Times any writer made a producer wait
    pub backpressure_events: u64,
    /// Estimated chance of a truncated-hash collision among hashed files
    pub collision_probability: f64,
    /// Strategy used for the report
    pub strategy: ExtractStrategy,
    /// Per-phase durations
    pub timings: PhaseTimings,
    /// Duration of the entire scan
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Whether at least one duplicate group was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.duplicate_groups > 0
    }

    /// Whether any file was skipped with a warning.
    #[must_use]
    pub fn has_skipped(&self) -> bool {
        self.skipped_files > 0
    }

    /// Percentage of scanned bytes taken by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        bytesize::ByteSize(self.reclaimable_space).to_string()
    }

    /// Total size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        bytesize::ByteSize(self.total_size).to_string()
    }
}

/// Outcome of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Scan statistics
    pub summary: ScanSummary,
    /// The report file
    pub report_path: PathBuf,
    /// Layout of the report file
    pub layout: ReportLayout,
    /// Output directory of the run
    pub output_dir: PathBuf,
}

impl ScanReport {
    /// Read every group back from the report file.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] if the report cannot be read or parsed.
    pub fn load_groups(&self) -> Result<Vec<DuplicateGroup>, FinderError> {
        read_groups(&self.report_path, self.layout)
    }

    /// Stream the groups of the report file one at a time.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::IoWithPath`] if the report cannot be opened.
    pub fn groups(&self) -> Result<ReportGroups, FinderError> {
        ReportGroups::open(&self.report_path, self.layout)
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The provided path does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The provided path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A path could not be stat'd for a reason other than absence or permissions.
    #[error("Failed to stat {path}: {source}")]
    Stat {
        /// Path being stat'd
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A candidate file failed to hash for a non-skippable reason.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// An I/O error occurred during scanning.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O error occurred during scanning with a specific path.
    #[error("I/O error for {path}: {source}")]
    IoWithPath {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An intermediate file holds a malformed line.
    #[error("Corrupt record in {file} line {line}: {source}")]
    Corrupt {
        /// File being read
        file: PathBuf,
        /// 1-based line number
        line: u64,
        /// What was wrong with the line
        #[source]
        source: RecordError,
    },

    /// Intermediate files disagree with each other.
    #[error("Inconsistent intermediate state: {0}")]
    Inconsistent(String),

    /// An output file could not be written.
    #[error(transparent)]
    Writer(#[from] WriteQueueError),

    /// The hashing thread pool could not be built.
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A scan error occurred.
    #[error(transparent)]
    ScanError(#[from] ScanError),
}

impl From<WalkError> for FinderError {
    fn from(e: WalkError) -> Self {
        match e {
            WalkError::Root(ScanError::NotFound(path)) => FinderError::PathNotFound(path),
            WalkError::Root(ScanError::NotADirectory(path)) => FinderError::NotADirectory(path),
            WalkError::Root(other) => FinderError::ScanError(other),
            WalkError::Writer(e) => FinderError::Writer(e),
        }
    }
}

/// Result of listing the scan roots without duplicate detection.
#[derive(Debug, Clone)]
pub struct PathListing {
    /// Walk counters
    pub stats: WalkStats,
    /// The written path list
    pub paths_file: PathBuf,
    /// Time spent walking
    pub duration: Duration,
}

/// Duplicate finder that orchestrates the detection pipeline.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The finder's configuration.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    fn open_workspace(&self) -> Result<RunWorkspace, FinderError> {
        self.config.pipeline.validate()?;
        RunWorkspace::open(&self.config.output_dir).map_err(|source| FinderError::IoWithPath {
            path: self.config.output_dir.clone(),
            source,
        })
    }

    fn walk(
        &self,
        workspace: &RunWorkspace,
        roots: &[PathBuf],
        walker_config: WalkerConfig,
    ) -> Result<PathListing, FinderError> {
        let start = Instant::now();
        let paths_file = workspace.paths_file();
        log::info!("Starting walk of {} root(s)", roots.len());

        let mut walker = Walker::new(roots.to_vec(), walker_config);
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        // Report bad roots before creating any output.
        walker.validate_roots().map_err(WalkError::Root)?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase::WALK, 0);
        }
        let queue = WriteQueue::create(&paths_file, self.config.pipeline.write_queue_capacity)?;
        let stats = walker.write_paths(&queue.handle())?;
        queue.finish()?;
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase::WALK);
        }

        if stats.interrupted {
            log::info!("Walk: Interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }
        Ok(PathListing {
            stats,
            paths_file,
            duration: start.elapsed(),
        })
    }

    /// Walk `roots` and write the path list only.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::PathNotFound`] / [`FinderError::NotADirectory`]
    /// for a bad root, or an I/O error writing the list.
    pub fn list_paths(
        &self,
        roots: &[PathBuf],
        walker_config: WalkerConfig,
    ) -> Result<PathListing, FinderError> {
        let workspace = self.open_workspace()?;
        self.walk(&workspace, roots, walker_config)
    }

    /// Walk `roots` and find duplicates among their regular files.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError`] for bad roots, structural failures, or
    /// interruption. Individual unreadable files are skipped.
    pub fn find_duplicates_in_paths(
        &self,
        roots: &[PathBuf],
        walker_config: WalkerConfig,
    ) -> Result<ScanReport, FinderError> {
        let start = Instant::now();
        let workspace = self.open_workspace()?;
        let listing = self.walk(&workspace, roots, walker_config)?;
        log::info!(
            "Found {} files ({}) across all roots",
            listing.stats.files,
            bytesize::ByteSize(listing.stats.total_size)
        );

        let file = File::open(&listing.paths_file).map_err(|source| FinderError::IoWithPath {
            path: listing.paths_file.clone(),
            source,
        })?;
        let input = BufReader::with_capacity(self.config.pipeline.read_chunk_size, file);

        let mut report = self.run_pipeline(input, &workspace, start)?;
        report.summary.skipped_files += listing.stats.skipped;
        report.summary.timings.walk = listing.duration;
        Ok(report)
    }

    /// Find duplicates among the paths of a line-delimited path list.
    ///
    /// # Errors
    ///
    /// See [`find_duplicates_in_paths`](Self::find_duplicates_in_paths).
    pub fn find_duplicates_from_path_list<R: BufRead>(
        &self,
        input: R,
    ) -> Result<ScanReport, FinderError> {
        let start = Instant::now();
        let workspace = self.open_workspace()?;
        self.run_pipeline(input, &workspace, start)
    }

    fn run_pipeline<R: BufRead>(
        &self,
        input: R,
        workspace: &RunWorkspace,
        start: Instant,
    ) -> Result<ScanReport, FinderError> {
        let pipeline = &self.config.pipeline;
        let strategy = pipeline.strategy;
        let (report_path, layout) = match strategy {
            ExtractStrategy::Seek => (workspace.formatted_report(), ReportLayout::Grouped),
            ExtractStrategy::Sort => (workspace.sorted_report(), ReportLayout::Sorted),
        };
        let mut summary = ScanSummary {
            strategy,
            ..Default::default()
        };

        // Classify
        let phase_start = Instant::now();
        log::info!("Phase 1: Classifying by size...");
        let classified = SizeClassifier::new(&self.config).classify(input, &workspace.sizes_file())?;
        summary.timings.classify = phase_start.elapsed();
        summary.input_paths = classified.stats.input_paths;
        summary.total_files = classified.stats.classified;
        summary.total_size = classified.stats.total_size;
        summary.skipped_files = classified.stats.skipped;
        summary.non_regular_files = classified.stats.non_regular;
        summary.candidate_files = classified.candidate_count;
        summary.backpressure_events = classified.stats.backpressure_events;

        if classified.candidate_count == 0 {
            log::info!("No potential duplicates found after size classification");
            File::create(&report_path).map_err(|source| FinderError::IoWithPath {
                path: report_path.clone(),
                source,
            })?;
            return self.finish(workspace, summary, report_path, layout, start);
        }

        // Hash
        let phase_start = Instant::now();
        log::info!("Phase 2: Hashing candidates...");
        let hashed = BoundedHasher::new(&self.config).hash_candidates(
            &classified.sizes_file,
            &classified.candidates,
            classified.candidate_count,
            &workspace.hashes_file(),
        )?;
        summary.timings.hash = phase_start.elapsed();
        summary.hashed_files = hashed.hashed;
        summary.skipped_files += hashed.skipped;
        summary.peak_in_flight = hashed.peak_in_flight;
        summary.backpressure_events += hashed.backpressure_events;
        summary.collision_probability = collision_probability(pipeline.hash_width, hashed.hashed);

        // Filter
        let phase_start = Instant::now();
        log::info!("Phase 3: Filtering duplicate hashes...");
        let duplicates = filter_duplicates(&workspace.hashes_file(), &self.config)?;
        summary.timings.filter = phase_start.elapsed();
        summary.duplicate_groups = duplicates.len() as u64;
        summary.duplicate_files = duplicates.total_records() - duplicates.len() as u64;
        summary.reclaimable_space = duplicates.reclaimable_bytes();

        // Extract
        let phase_start = Instant::now();
        match strategy {
            ExtractStrategy::Seek => {
                log::info!("Phase 4: Seek extraction...");
                let stats = SeekExtractor::new(&self.config).extract(
                    &workspace.hashes_file(),
                    &duplicates,
                    &report_path,
                )?;
                summary.backpressure_events += stats.backpressure_events;
            }
            ExtractStrategy::Sort => {
                log::info!("Phase 4: External sort...");
                write_duplicates_file(
                    &workspace.hashes_file(),
                    &duplicates,
                    &workspace.duplicates_file(),
                    &self.config,
                )?;
                let chunks_dir = workspace
                    .chunks_dir()
                    .map_err(|source| FinderError::IoWithPath {
                        path: workspace.root().to_path_buf(),
                        source,
                    })?;
                let stats = ExternalSorter::new(&self.config).sort(
                    &workspace.duplicates_file(),
                    &chunks_dir,
                    &report_path,
                )?;
                summary.backpressure_events += stats.backpressure_events;
            }
        }
        summary.timings.extract = phase_start.elapsed();

        self.finish(workspace, summary, report_path, layout, start)
    }

    fn finish(
        &self,
        workspace: &RunWorkspace,
        mut summary: ScanSummary,
        report_path: PathBuf,
        layout: ReportLayout,
        start: Instant,
    ) -> Result<ScanReport, FinderError> {
        if !self.config.pipeline.keep_intermediate {
            let removed = workspace
                .cleanup_scratch(false)
                .map_err(|source| FinderError::IoWithPath {
                    path: workspace.root().to_path_buf(),
                    source,
                })?;
            log::debug!("Removed {} intermediate file(s)", removed);
        }
        summary.scan_duration = start.elapsed();

        log::info!(
            "Scan complete: {} files, {} duplicate groups, {} duplicates, {} reclaimable in {:.2}s",
            summary.total_files,
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.scan_duration.as_secs_f64()
        );
        log::info!("Report written to {}", report_path.display());

        Ok(ScanReport {
            summary,
            report_path,
            layout,
            output_dir: workspace.root().to_path_buf(),
        })
    }
}
