//! Resumable line reader with a cooperative pause contract.
//!
//! The reader hands one line at a time to a callback. When the callback
//! answers [`ReadSignal::Pause`], the reader stops pulling input and
//! returns [`ReaderState::Paused`]; it refuses to read again until
//! [`ResumableLineReader::resume`] is called. Producers therefore can
//! never run ahead of whatever capacity the callback is guarding.
//!
//! # Example
//!
//! ```
//! use dupescan::io::{ReadSignal, ReaderState, ResumableLineReader};
//! use std::io::Cursor;
//!
//! let mut reader = ResumableLineReader::new(Cursor::new("a\nb\nc\n"));
//! let mut seen = Vec::new();
//!
//! // Pause after every second line.
//! loop {
//!     let state = reader
//!         .drive(|line| -> std::io::Result<ReadSignal> {
//!             seen.push(line.text.to_string());
//!             Ok(if line.number % 2 == 0 { ReadSignal::Pause } else { ReadSignal::Continue })
//!         })
//!         .unwrap();
//!     match state {
//!         ReaderState::Paused => reader.resume(),
//!         ReaderState::Exhausted => break,
//!     }
//! }
//! assert_eq!(seen, vec!["a", "b", "c"]);
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Answer of a line callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSignal {
    /// Keep pulling lines.
    Continue,
    /// Stop pulling lines until [`ResumableLineReader::resume`] is called.
    Pause,
}

/// Why [`ResumableLineReader::drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// The callback asked for a pause.
    Paused,
    /// End of input.
    Exhausted,
}

/// A line handed to the callback.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// Line content without the trailing newline
    pub text: &'a str,
    /// 1-based line number
    pub number: u64,
    /// Byte offset of the first byte of this line
    pub offset: u64,
}

/// Line reader that can be paused and resumed by its consumer.
#[derive(Debug)]
pub struct ResumableLineReader<R> {
    inner: R,
    buf: String,
    line_number: u64,
    offset: u64,
    paused: bool,
    exhausted: bool,
}

impl ResumableLineReader<BufReader<File>> {
    /// Open a file for line reading with the given buffer capacity.
    ///
    /// # Errors
    ///
    /// Returns the error of [`File::open`].
    pub fn open(path: &Path, capacity: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(capacity.max(1), file)))
    }
}

impl<R: BufRead> ResumableLineReader<R> {
    /// Wrap a buffered reader.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
            line_number: 0,
            offset: 0,
            paused: false,
            exhausted: false,
        }
    }

    /// Number of lines handed out so far.
    #[must_use]
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Byte offset of the next unread line.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the consumer asked for a pause that has not been lifted.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the end of input has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Lift a pause so the next [`drive`](Self::drive) call reads again.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Feed lines to `on_line` until it pauses or input ends.
    ///
    /// Calling `drive` while paused returns [`ReaderState::Paused`]
    /// immediately without consuming input.
    ///
    /// # Errors
    ///
    /// Read errors are converted into `E`; errors returned by the callback
    /// are propagated unchanged.
    pub fn drive<E, F>(&mut self, mut on_line: F) -> Result<ReaderState, E>
    where
        E: From<io::Error>,
        F: FnMut(Line<'_>) -> Result<ReadSignal, E>,
    {
        if self.exhausted {
            return Ok(ReaderState::Exhausted);
        }
        if self.paused {
            return Ok(ReaderState::Paused);
        }

        loop {
            self.buf.clear();
            let read = self.inner.read_line(&mut self.buf)?;
            if read == 0 {
                self.exhausted = true;
                return Ok(ReaderState::Exhausted);
            }

            let start = self.offset;
            self.offset += read as u64;
            self.line_number += 1;

            let text = self.buf.strip_suffix('\n').unwrap_or(&self.buf);
            let line = Line {
                text,
                number: self.line_number,
                offset: start,
            };

            if on_line(line)? == ReadSignal::Pause {
                self.paused = true;
                return Ok(ReaderState::Paused);
            }
        }
    }

    /// Read the next line, ignoring the pause protocol.
    ///
    /// Used by consumers that pull one line at a time, such as the two
    /// sides of a merge.
    ///
    /// # Errors
    ///
    /// Returns any read error of the underlying reader.
    pub fn next_line(&mut self) -> io::Result<Option<Line<'_>>> {
        if self.exhausted {
            return Ok(None);
        }
        self.buf.clear();
        let read = self.inner.read_line(&mut self.buf)?;
        if read == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let start = self.offset;
        self.offset += read as u64;
        self.line_number += 1;

        Ok(Some(Line {
            text: self.buf.strip_suffix('\n').unwrap_or(&self.buf),
            number: self.line_number,
            offset: start,
        }))
    }
}
