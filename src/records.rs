//! Line codecs for the intermediate files of the pipeline.
//!
//! # Overview
//!
//! Every intermediate file is newline-terminated text with space-separated
//! fields, the path always last so that it may itself contain spaces:
//!
//! | File | Line |
//! |---|---|
//! | sizes file | `<size> <path>` |
//! | hash file, duplicates file, sorted output | `<hash> <size> <path>` |
//!
//! A line that does not match its expected shape is never skipped: the
//! caller turns the [`RecordError`] into a fatal
//! [`FinderError::Corrupt`](crate::duplicates::FinderError::Corrupt).
//!
//! # Example
//!
//! ```
//! use dupescan::records::{HashRecord, SizeRecord};
//!
//! let size = SizeRecord::parse("10 /data/a file.txt").unwrap();
//! assert_eq!(size.size, 10);
//! assert_eq!(size.path, "/data/a file.txt");
//!
//! let record = HashRecord::parse("0123456789abcdef 10 /data/a").unwrap();
//! assert_eq!(record.to_string(), "0123456789abcdef 10 /data/a");
//! ```

use std::cmp::Ordering;
use std::fmt;

/// Errors produced when a line does not match its record format.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// The size field is not an unsigned integer.
    #[error("invalid size `{0}`")]
    InvalidSize(String),

    /// The hash field is empty or not lowercase hexadecimal.
    #[error("invalid hash `{0}`")]
    InvalidHash(String),

    /// The path field is empty.
    #[error("empty path")]
    EmptyPath,
}

/// `<size> <path>`, one line of the sizes file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeRecord {
    /// File size in bytes
    pub size: u64,
    /// Path as it was read from the path source
    pub path: String,
}

impl SizeRecord {
    /// Create a new size record.
    #[must_use]
    pub fn new(size: u64, path: impl Into<String>) -> Self {
        Self {
            size,
            path: path.into(),
        }
    }

    /// Parse one line of the sizes file (without its newline).
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if the size is missing or not a number, or
    /// the path is empty.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let (size, path) = line
            .split_once(' ')
            .ok_or(RecordError::MissingField("path"))?;
        let size = parse_size(size)?;
        if path.is_empty() {
            return Err(RecordError::EmptyPath);
        }
        Ok(Self::new(size, path))
    }
}

impl fmt::Display for SizeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.size, self.path)
    }
}

/// Identity of a duplicate group: truncated hash plus file size.
///
/// Keying on both fields means a truncated-hash collision between files of
/// different sizes can never merge two groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DupKey {
    /// Truncated hex digest
    pub hash: String,
    /// File size in bytes
    pub size: u64,
}

impl DupKey {
    /// Create a new key.
    #[must_use]
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }

    /// Report order: largest files first, then by hash.
    #[must_use]
    pub fn report_cmp(&self, other: &Self) -> Ordering {
        other
            .size
            .cmp(&self.size)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl fmt::Display for DupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hash, self.size)
    }
}

/// `<hash> <size> <path>`, one line of the hash file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    /// Truncated hex digest of the file content
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Path of the hashed file
    pub path: String,
}

impl HashRecord {
    /// Create a new hash record.
    #[must_use]
    pub fn new(hash: impl Into<String>, size: u64, path: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            size,
            path: path.into(),
        }
    }

    /// Parse one line of a hash-format file (without its newline).
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] if a field is missing or malformed.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let mut fields = line.splitn(3, ' ');
        let hash = fields.next().ok_or(RecordError::MissingField("hash"))?;
        let size = fields.next().ok_or(RecordError::MissingField("size"))?;
        let path = fields.next().ok_or(RecordError::MissingField("path"))?;

        if !is_hex_digest(hash) {
            return Err(RecordError::InvalidHash(hash.to_string()));
        }
        let size = parse_size(size)?;
        if path.is_empty() {
            return Err(RecordError::EmptyPath);
        }
        Ok(Self::new(hash, size, path))
    }

    /// The group this record belongs to.
    #[must_use]
    pub fn key(&self) -> DupKey {
        DupKey::new(self.hash.clone(), self.size)
    }

    /// Whether this record belongs to `key`, without allocating.
    #[must_use]
    pub fn matches(&self, key: &DupKey) -> bool {
        self.size == key.size && self.hash == key.hash
    }

    /// Total order used by the external sort: size descending, hash
    /// ascending, path ascending.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        other
            .size
            .cmp(&self.size)
            .then_with(|| self.hash.cmp(&other.hash))
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl fmt::Display for HashRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hash, self.size, self.path)
    }
}

/// Cheap pre-check used by the seek extractor before a full parse.
#[must_use]
pub fn line_has_hash_prefix(line: &str, hash: &str) -> bool {
    line.len() > hash.len() && line.starts_with(hash) && line.as_bytes()[hash.len()] == b' '
}

fn parse_size(field: &str) -> Result<u64, RecordError> {
    if field.is_empty() {
        return Err(RecordError::MissingField("size"));
    }
    field
        .parse::<u64>()
        .map_err(|_| RecordError::InvalidSize(field.to_string()))
}

fn is_hex_digest(field: &str) -> bool {
    !field.is_empty()
        && field
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
