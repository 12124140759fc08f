//! Duplicate groups and readers for the two report layouts.
//!
//! # Overview
//!
//! A [`DuplicateGroup`] is every path sharing one `(hash, size)` key. The
//! final report stores groups in one of two layouts, and each has a
//! streaming reader yielding one group at a time:
//!
//! - [`ReportLayout::Grouped`] (seek extraction): a `<hash> <size>` header
//!   followed by indented member paths, read by [`BlockGroups`]
//! - [`ReportLayout::Sorted`] (external sort): `<hash> <size> <path>`
//!   records where a group is a run of adjacent equal keys, read by
//!   [`SortedGroups`]
//!
//! # Example
//!
//! ```
//! use dupescan::duplicates::SortedGroups;
//! use std::io::Cursor;
//!
//! let sorted = "aa 10 /a\naa 10 /b\nbb 4 /c\nbb 4 /d\n";
//! let groups: Vec<_> = SortedGroups::new(Cursor::new(sorted), "sorted.txt")
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].size, 10);
//! assert_eq!(groups[0].wasted_space(), 10);
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::extract::MEMBER_INDENT;
use super::finder::FinderError;
use crate::io::ResumableLineReader;
use crate::records::{DupKey, HashRecord, RecordError};

/// Layout of a final report file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLayout {
    /// Header lines followed by indented members.
    Grouped,
    /// Sorted records.
    Sorted,
}

/// Confirmed duplicate group of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Truncated content hash shared by all members
    pub hash: String,
    /// File size in bytes shared by all members
    pub size: u64,
    /// Member paths in report order
    pub members: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(hash: impl Into<String>, size: u64, members: Vec<PathBuf>) -> Self {
        Self {
            hash: hash.into(),
            size,
            members,
        }
    }

    /// The key shared by every member.
    #[must_use]
    pub fn key(&self) -> DupKey {
        DupKey::new(self.hash.clone(), self.size)
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.members.len() as u64
    }

    /// Space wasted by duplicates (all copies minus one).
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Number of duplicate files (excluding one original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }
}

/// Groups adjacent equal keys of a sorted record stream.
pub struct SortedGroups<R> {
    reader: ResumableLineReader<R>,
    source: PathBuf,
    pending: Option<HashRecord>,
    failed: bool,
}

impl<R: BufRead> SortedGroups<R> {
    /// Read groups from `input`; `source` names it in errors.
    pub fn new(input: R, source: impl Into<PathBuf>) -> Self {
        Self {
            reader: ResumableLineReader::new(input),
            source: source.into(),
            pending: None,
            failed: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<HashRecord>, FinderError> {
        let Some(line) = self.reader.next_line()? else {
            return Ok(None);
        };
        HashRecord::parse(line.text)
            .map(Some)
            .map_err(|source| FinderError::Corrupt {
                file: self.source.clone(),
                line: line.number,
                source,
            })
    }

    fn next_group(&mut self) -> Result<Option<DuplicateGroup>, FinderError> {
        let first = match self.pending.take() {
            Some(record) => record,
            None => match self.next_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };
        let key = first.key();
        let mut members = vec![PathBuf::from(first.path)];

        while let Some(record) = self.next_record()? {
            if record.matches(&key) {
                members.push(PathBuf::from(record.path));
            } else {
                self.pending = Some(record);
                break;
            }
        }
        Ok(Some(DuplicateGroup::new(key.hash, key.size, members)))
    }
}

impl<R: BufRead> Iterator for SortedGroups<R> {
    type Item = Result<DuplicateGroup, FinderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_group().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// Parses the grouped blocks written by seek extraction.
pub struct BlockGroups<R> {
    reader: ResumableLineReader<R>,
    source: PathBuf,
    pending: Option<DupKey>,
    failed: bool,
}

impl<R: BufRead> BlockGroups<R> {
    /// Read groups from `input`; `source` names it in errors.
    pub fn new(input: R, source: impl Into<PathBuf>) -> Self {
        Self {
            reader: ResumableLineReader::new(input),
            source: source.into(),
            pending: None,
            failed: false,
        }
    }

    fn corrupt(&self, line: u64, source: RecordError) -> FinderError {
        FinderError::Corrupt {
            file: self.source.clone(),
            line,
            source,
        }
    }

    fn next_group(&mut self) -> Result<Option<DuplicateGroup>, FinderError> {
        let key = match self.pending.take() {
            Some(key) => key,
            None => {
                let Some(line) = self.reader.next_line()? else {
                    return Ok(None);
                };
                let (text, number) = (line.text.to_string(), line.number);
                parse_header(&text).map_err(|e| self.corrupt(number, e))?
            }
        };

        let mut members = Vec::new();
        loop {
            let Some(line) = self.reader.next_line()? else {
                break;
            };
            if let Some(path) = line.text.strip_prefix(MEMBER_INDENT) {
                if path.is_empty() {
                    let number = line.number;
                    return Err(self.corrupt(number, RecordError::EmptyPath));
                }
                members.push(PathBuf::from(path));
            } else {
                let (text, number) = (line.text.to_string(), line.number);
                self.pending = Some(parse_header(&text).map_err(|e| self.corrupt(number, e))?);
                break;
            }
        }
        Ok(Some(DuplicateGroup::new(key.hash, key.size, members)))
    }
}

impl<R: BufRead> Iterator for BlockGroups<R> {
    type Item = Result<DuplicateGroup, FinderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_group().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// Parse a `<hash> <size>` block header.
fn parse_header(text: &str) -> Result<DupKey, RecordError> {
    let (hash, size) = text
        .split_once(' ')
        .ok_or(RecordError::MissingField("size"))?;
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RecordError::InvalidHash(hash.to_string()));
    }
    let size = size
        .parse::<u64>()
        .map_err(|_| RecordError::InvalidSize(size.to_string()))?;
    Ok(DupKey::new(hash, size))
}

/// Streaming reader over a report file of either layout.
pub enum ReportGroups {
    /// Seek extraction output.
    Grouped(BlockGroups<BufReader<File>>),
    /// External sort output.
    Sorted(SortedGroups<BufReader<File>>),
}

impl ReportGroups {
    /// Open `path` for reading one group at a time.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::IoWithPath`] if the file cannot be opened.
    pub fn open(path: &Path, layout: ReportLayout) -> Result<Self, FinderError> {
        let file = File::open(path).map_err(|source| FinderError::IoWithPath {
            path: path.to_path_buf(),
            source,
        })?;
        let input = BufReader::new(file);
        Ok(match layout {
            ReportLayout::Grouped => Self::Grouped(BlockGroups::new(input, path)),
            ReportLayout::Sorted => Self::Sorted(SortedGroups::new(input, path)),
        })
    }
}

impl Iterator for ReportGroups {
    type Item = Result<DuplicateGroup, FinderError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Grouped(groups) => groups.next(),
            Self::Sorted(groups) => groups.next(),
        }
    }
}

/// Load every group of a report file.
///
/// # Errors
///
/// Returns [`FinderError::IoWithPath`] if the file cannot be opened and
/// [`FinderError::Corrupt`] if it does not match `layout`.
pub fn read_groups(path: &Path, layout: ReportLayout) -> Result<Vec<DuplicateGroup>, FinderError> {
    ReportGroups::open(path, layout)?.collect()
}
