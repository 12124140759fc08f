//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size classification into candidate sizes
//! - Bounded-concurrency content hashing
//! - Filtering to keys shared by two or more files
//! - Seek extraction and external merge sort of the result
//! - Duplicate group management and pipeline orchestration

pub mod classify;
pub mod extract;
pub mod filter;
pub mod finder;
pub mod groups;
pub mod hashing;
pub mod sort;
pub mod workspace;

pub use classify::{CandidateSizeSet, ClassifyOutcome, ClassifyStats, SizeClassifier, SizeHistogram};
pub use extract::{ExtractStats, SeekExtractor};
pub use filter::{
    build_histogram, filter_duplicates, write_duplicates_file, DuplicateHashSet, HashHistogram,
    KeyTally,
};
pub use finder::{
    DuplicateFinder, FinderConfig, FinderError, PathListing, PhaseTimings, ScanReport, ScanSummary,
};
pub use groups::{
    read_groups, BlockGroups, DuplicateGroup, ReportGroups, ReportLayout, SortedGroups,
};
pub use hashing::{BoundedHasher, HashStats};
pub use sort::{ExternalSorter, SortStats};
pub use workspace::RunWorkspace;
