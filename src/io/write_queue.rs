//! Bounded write queue feeding a single writer thread.
//!
//! # Overview
//!
//! Every output file of the pipeline is owned by exactly one
//! [`WriteQueue`]. The queue spawns a dedicated thread that holds the
//! `BufWriter<File>` and receives lines over a bounded channel. Any number
//! of producers write through cloned [`WriteHandle`]s; when the channel is
//! full they all block on that same channel until the writer catches up.
//! That one wait condition is the only back-pressure mechanism, so no
//! producer ever subscribes a drain listener of its own.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::io::WriteQueue;
//! use std::path::Path;
//!
//! let queue = WriteQueue::create(Path::new("out.txt"), 1024).unwrap();
//! let handle = queue.handle();
//! handle.write_line("hello").unwrap();
//! let summary = queue.finish().unwrap();
//! assert_eq!(summary.lines, 1);
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Messages sent to the writer thread.
#[derive(Debug)]
enum WriterMessage {
    /// Append one line (a newline is added by the writer)
    Line(String),
    /// Flush and stop; lines queued after this are dropped
    Finish,
}

/// Errors reported by a write queue.
#[derive(thiserror::Error, Debug)]
pub enum WriteQueueError {
    /// The output file could not be created.
    #[error("Failed to create {path}: {source}")]
    Create {
        /// Output path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing or flushing the output file failed.
    #[error("Write to {path} failed: {source}")]
    Write {
        /// Output path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The writer thread is gone; the real cause is reported by `finish`.
    #[error("Writer for {0} has stopped")]
    Closed(PathBuf),

    /// The writer thread panicked.
    #[error("Writer thread for {0} panicked")]
    Panicked(PathBuf),
}

/// Counters shared between producers and the writer thread.
#[derive(Debug, Default)]
pub struct WriteQueueStats {
    /// Lines accepted by the writer thread
    pub lines_written: AtomicU64,
    /// Bytes written, newlines included
    pub bytes_written: AtomicU64,
    /// Times a producer found the channel full and had to wait
    pub backpressure_events: AtomicU64,
}

/// Final figures of a finished queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Lines written
    pub lines: u64,
    /// Bytes written
    pub bytes: u64,
    /// Back-pressure waits observed by producers
    pub backpressure_events: u64,
}

/// Cloneable producer side of a [`WriteQueue`].
#[derive(Debug, Clone)]
pub struct WriteHandle {
    sender: Sender<WriterMessage>,
    stats: Arc<WriteQueueStats>,
    path: Arc<Path>,
}

impl WriteHandle {
    /// Queue one line, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`WriteQueueError::Closed`] if the writer thread stopped,
    /// normally because of an I/O failure that `finish` will report.
    pub fn write_line(&self, line: impl Into<String>) -> Result<(), WriteQueueError> {
        let message = WriterMessage::Line(line.into());
        match self.sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                self.stats
                    .backpressure_events
                    .fetch_add(1, Ordering::Relaxed);
                self.sender
                    .send(message)
                    .map_err(|_| WriteQueueError::Closed(self.path.to_path_buf()))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(WriteQueueError::Closed(self.path.to_path_buf()))
            }
        }
    }

    /// Output path of this queue.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owner of one output file and its writer thread.
#[derive(Debug)]
pub struct WriteQueue {
    handle: WriteHandle,
    thread: Option<JoinHandle<Result<(), WriteQueueError>>>,
}

impl WriteQueue {
    /// Create (truncate) `path` and start its writer thread.
    ///
    /// `capacity` is the number of lines that may be queued before
    /// producers block (minimum 1).
    ///
    /// # Errors
    ///
    /// Returns [`WriteQueueError::Create`] if the file cannot be created.
    pub fn create(path: &Path, capacity: usize) -> Result<Self, WriteQueueError> {
        let file = File::create(path).map_err(|source| WriteQueueError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let (sender, receiver) = bounded(capacity.max(1));
        let stats = Arc::new(WriteQueueStats::default());
        let path: Arc<Path> = Arc::from(path);

        let thread_stats = Arc::clone(&stats);
        let thread_path = Arc::clone(&path);
        let thread = thread::Builder::new()
            .name("write-queue".to_string())
            .spawn(move || run_writer(file, &receiver, &thread_stats, &thread_path))
            .map_err(|source| WriteQueueError::Create {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            handle: WriteHandle {
                sender,
                stats,
                path,
            },
            thread: Some(thread),
        })
    }

    /// A new producer handle.
    #[must_use]
    pub fn handle(&self) -> WriteHandle {
        self.handle.clone()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> &WriteQueueStats {
        &self.handle.stats
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Flush everything queued so far, stop the writer, and report totals.
    ///
    /// All producers must be done before calling this; lines sent after
    /// `finish` are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first write/flush error of the writer thread.
    pub fn finish(mut self) -> Result<WriteSummary, WriteQueueError> {
        // A send failure means the writer already stopped; join reports why.
        let _ = self.handle.sender.send(WriterMessage::Finish);
        self.join()?;

        let stats = &self.handle.stats;
        Ok(WriteSummary {
            lines: stats.lines_written.load(Ordering::Relaxed),
            bytes: stats.bytes_written.load(Ordering::Relaxed),
            backpressure_events: stats.backpressure_events.load(Ordering::Relaxed),
        })
    }

    fn join(&mut self) -> Result<(), WriteQueueError> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| WriteQueueError::Panicked(self.handle.path.to_path_buf()))?,
            None => Ok(()),
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.sender.send(WriterMessage::Finish);
            if let Err(e) = self.join() {
                log::warn!("Write queue dropped with error: {}", e);
            }
        }
    }
}

fn run_writer(
    file: File,
    receiver: &Receiver<WriterMessage>,
    stats: &WriteQueueStats,
    path: &Path,
) -> Result<(), WriteQueueError> {
    let write_err = |source| WriteQueueError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(file);

    // Ends on Finish, or when every sender is gone.
    while let Ok(WriterMessage::Line(line)) = receiver.recv() {
        writer.write_all(line.as_bytes()).map_err(write_err)?;
        writer.write_all(b"\n").map_err(write_err)?;
        stats.lines_written.fetch_add(1, Ordering::Relaxed);
        stats
            .bytes_written
            .fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
    }

    writer.flush().map_err(write_err)?;
    log::trace!("Writer for {} finished", path.display());
    Ok(())
}
