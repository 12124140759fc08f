//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] feeds a file into a BLAKE3 digest one read chunk at a time
//! and keeps only the first `width` hex characters of the result. The
//! truncated digest trades collision resistance for record size: with `n`
//! hashed files the chance that any two different contents share a
//! truncated hash is about `n(n-1)/2 / 16^width` (see
//! [`collision_probability`]). At the default width of 16 characters
//! (64 bits) that is roughly 1 in 10^12 for 6,000 candidate files.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new(16, 64 * 1024);
//! let hash = hasher.hash_file(Path::new("Cargo.toml")).unwrap();
//! assert_eq!(hash.len(), 16);
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::HashError;

/// Hex characters kept by default (64 bits).
pub const DEFAULT_HASH_WIDTH: usize = 16;

/// Smallest accepted width (32 bits).
pub const MIN_HASH_WIDTH: usize = 8;

/// Full BLAKE3 digest length in hex characters.
pub const MAX_HASH_WIDTH: usize = 64;

/// Streaming content hasher producing truncated hex digests.
#[derive(Debug, Clone)]
pub struct Hasher {
    width: usize,
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_WIDTH, 64 * 1024)
    }
}

impl Hasher {
    /// Create a hasher keeping `width` hex characters and reading
    /// `chunk_size` bytes at a time.
    ///
    /// The width is clamped to `MIN_HASH_WIDTH..=MAX_HASH_WIDTH`.
    #[must_use]
    pub fn new(width: usize, chunk_size: usize) -> Self {
        Self {
            width: width.clamp(MIN_HASH_WIDTH, MAX_HASH_WIDTH),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Hex characters kept per digest.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Bytes per read.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] classifying the open or read failure.
    pub fn hash_file(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.hash_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Hash everything a reader yields.
    ///
    /// # Errors
    ///
    /// Returns the first read error other than `Interrupted`.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<String> {
        let mut digest = blake3::Hasher::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    digest.update(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(self.truncate(&digest.finalize()))
    }

    /// Hash an in-memory buffer.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        self.truncate(&blake3::hash(data))
    }

    fn truncate(&self, hash: &blake3::Hash) -> String {
        let hex = hash.to_hex();
        hex.as_str()[..self.width].to_string()
    }
}

/// Probability of at least one truncated-hash collision among `files`
/// distinct contents at `width` hex characters (birthday bound).
#[must_use]
pub fn collision_probability(width: usize, files: u64) -> f64 {
    if files < 2 {
        return 0.0;
    }
    let pairs = files as f64 * (files as f64 - 1.0) / 2.0;
    let space = 16f64.powi(width.min(MAX_HASH_WIDTH) as i32);
    (pairs / space).min(1.0)
}
