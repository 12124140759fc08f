//! Bounded-concurrency content hashing.
//!
//! # Overview
//!
//! The hasher re-reads the sizes file through a [`ResumableLineReader`].
//! Every record whose size is a candidate becomes a hash job on a fixed
//! rayon pool of `io_threads` workers. An [`InFlightGate`] counts jobs
//! that were dispatched but have not finished; once it reaches
//! `max_in_flight` the line callback answers [`ReadSignal::Pause`] and the
//! driver blocks until a slot frees up before resuming the reader. After
//! the input ends the driver waits for the gate to drain, so the stage
//! never returns with work still running.
//!
//! Jobs append `<hash> <size> <path>` records to the hash file through a
//! shared [`WriteHandle`]. Completion order decides record order, so the
//! hash file is unordered.
//!
//! Files that vanished, are unreadable, or turned into directories are
//! logged and skipped. Any other read failure stops dispatching, lets the
//! running jobs finish, and is returned.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::classify::CandidateSizeSet;
use super::finder::{FinderConfig, FinderError};
use crate::io::{
    GatePermit, InFlightGate, Line, ReadSignal, ReaderState, ResumableLineReader, WriteHandle,
    WriteQueue, WriteQueueError,
};
use crate::progress::{percent, phase, ProgressCallback, ProgressThrottle};
use crate::records::{HashRecord, SizeRecord};
use crate::scanner::{HashError, Hasher};

/// Statistics from the hashing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashStats {
    /// Records read from the sizes file
    pub records_read: u64,
    /// Records whose size was not a candidate
    pub non_candidates: u64,
    /// Hash jobs dispatched
    pub dispatched: u64,
    /// Files hashed and written to the hash file
    pub hashed: u64,
    /// Files skipped because they vanished or could not be read
    pub skipped: u64,
    /// Bytes fed into the digest
    pub bytes_hashed: u64,
    /// Most jobs observed in flight at once
    pub peak_in_flight: usize,
    /// Times a job found the hash writer full
    pub backpressure_events: u64,
}

/// Fatal failure of a hash job.
#[derive(Debug)]
enum JobError {
    Hash(HashError),
    Writer(WriteQueueError),
}

impl From<JobError> for FinderError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::Hash(e) => FinderError::Hash(e),
            JobError::Writer(e) => FinderError::Writer(e),
        }
    }
}

/// State shared between the dispatcher and the jobs.
struct JobShared {
    hasher: Hasher,
    out: WriteHandle,
    total: u64,
    completed: AtomicU64,
    hashed: AtomicU64,
    skipped: AtomicU64,
    bytes_hashed: AtomicU64,
    failed: AtomicBool,
    failure: Mutex<Option<JobError>>,
    throttle: ProgressThrottle,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl JobShared {
    fn fail(&self, error: JobError) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
        self.failed.store(true, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Option<JobError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn run(&self, record: SizeRecord) {
        match self.hasher.hash_file(Path::new(&record.path)) {
            Ok(hash) => {
                let line = HashRecord::new(hash, record.size, record.path).to_string();
                match self.out.write_line(line) {
                    Ok(()) => {
                        self.hashed.fetch_add(1, Ordering::Relaxed);
                        self.bytes_hashed.fetch_add(record.size, Ordering::Relaxed);
                    }
                    Err(e) => self.fail(JobError::Writer(e)),
                }
            }
            Err(e) if e.is_skippable() => {
                log::warn!("Skipping {}", e);
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::error!("Failed to hash {}: {}", record.path, e);
                self.fail(JobError::Hash(e));
            }
        }

        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.throttle.ready() {
            log::info!(
                "Hashing: {:.1}% ({}/{})",
                percent(completed, self.total),
                completed,
                self.total
            );
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(phase::HASH, completed);
            }
        }
    }
}

/// Hashes candidate files under a concurrency ceiling.
pub struct BoundedHasher<'a> {
    config: &'a FinderConfig,
    hasher: Hasher,
}

impl<'a> BoundedHasher<'a> {
    /// Create a hasher stage using the pipeline's width and chunk size.
    #[must_use]
    pub fn new(config: &'a FinderConfig) -> Self {
        let hasher = Hasher::new(
            config.pipeline.hash_width,
            config.pipeline.read_chunk_size,
        );
        Self { config, hasher }
    }

    /// Hash every candidate record of `sizes_file` into `hash_file`.
    ///
    /// `candidate_count` is only used for progress percentages.
    ///
    /// # Errors
    ///
    /// - [`FinderError::Corrupt`] if a sizes line is malformed
    /// - [`FinderError::Hash`] for a non-skippable read failure
    /// - [`FinderError::Writer`] if the hash file cannot be written
    /// - [`FinderError::ThreadPool`] if the worker pool cannot be built
    /// - [`FinderError::Interrupted`] if shutdown was requested
    pub fn hash_candidates(
        &self,
        sizes_file: &Path,
        candidates: &CandidateSizeSet,
        candidate_count: u64,
        hash_file: &Path,
    ) -> Result<HashStats, FinderError> {
        let pipeline = &self.config.pipeline;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pipeline.io_threads)
            .thread_name(|i| format!("hash-{i}"))
            .build()?;
        let gate = Arc::new(InFlightGate::new(pipeline.max_in_flight));
        let queue = WriteQueue::create(hash_file, pipeline.write_queue_capacity)?;
        let shared = Arc::new(JobShared {
            hasher: self.hasher.clone(),
            out: queue.handle(),
            total: candidate_count,
            completed: AtomicU64::new(0),
            hashed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            bytes_hashed: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
            throttle: ProgressThrottle::new(pipeline.progress_interval()),
            progress_callback: self.config.progress_callback.clone(),
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(phase::HASH, candidate_count);
        }
        log::info!(
            "Hashing {} candidate files ({} threads, at most {} in flight)",
            candidate_count,
            pipeline.io_threads,
            gate.ceiling()
        );

        let mut stats = HashStats::default();
        let mut reader = ResumableLineReader::open(sizes_file, pipeline.read_chunk_size)
            .map_err(|source| FinderError::IoWithPath {
                path: sizes_file.to_path_buf(),
                source,
            })?;

        let mut on_line = |line: Line<'_>| -> Result<ReadSignal, FinderError> {
            if self.config.is_shutdown_requested() || shared.failed.load(Ordering::SeqCst) {
                return Ok(ReadSignal::Pause);
            }
            let record = SizeRecord::parse(line.text).map_err(|source| FinderError::Corrupt {
                file: sizes_file.to_path_buf(),
                line: line.number,
                source,
            })?;
            stats.records_read += 1;

            if !candidates.contains(record.size) {
                stats.non_candidates += 1;
                return Ok(ReadSignal::Continue);
            }

            gate.start();
            stats.dispatched += 1;
            let job_gate = Arc::clone(&gate);
            let job = Arc::clone(&shared);
            pool.spawn(move || {
                let _permit = GatePermit::adopt(&job_gate);
                job.run(record);
            });

            if gate.is_saturated() {
                Ok(ReadSignal::Pause)
            } else {
                Ok(ReadSignal::Continue)
            }
        };

        let driven = drive_dispatch(&mut reader, &mut on_line, &gate, self.config, &shared);
        // Jobs already started always run to completion.
        gate.wait_idle();
        let interrupted = driven?;

        stats.peak_in_flight = gate.high_water_mark();
        stats.hashed = shared.hashed.load(Ordering::Relaxed);
        stats.skipped = shared.skipped.load(Ordering::Relaxed);
        stats.bytes_hashed = shared.bytes_hashed.load(Ordering::Relaxed);
        let failure = shared.take_failure();
        drop(shared);

        let summary = queue.finish()?;
        stats.backpressure_events = summary.backpressure_events;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(phase::HASH);
        }
        if let Some(error) = failure {
            return Err(error.into());
        }
        if interrupted {
            log::info!("Hashing: Interrupted by shutdown signal");
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Hashing complete: {} hashed, {} skipped, peak {} in flight",
            stats.hashed,
            stats.skipped,
            stats.peak_in_flight
        );
        Ok(stats)
    }
}

/// Pump the reader until it is exhausted, shutdown is requested, or a job
/// failed. Returns whether the pass was interrupted.
fn drive_dispatch<R, F>(
    reader: &mut ResumableLineReader<R>,
    on_line: &mut F,
    gate: &InFlightGate,
    config: &FinderConfig,
    shared: &JobShared,
) -> Result<bool, FinderError>
where
    R: std::io::BufRead,
    F: FnMut(Line<'_>) -> Result<ReadSignal, FinderError>,
{
    loop {
        match reader.drive(&mut *on_line)? {
            ReaderState::Exhausted => return Ok(false),
            ReaderState::Paused => {
                if config.is_shutdown_requested() {
                    return Ok(true);
                }
                if shared.failed.load(Ordering::SeqCst) {
                    return Ok(false);
                }
                gate.wait_below_ceiling();
                reader.resume();
            }
        }
    }
}
