//! JSON output formatter for scan results.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "generated_at": "2026-01-01T12:00:00Z",
//!   "report_path": "/home/me/.local/share/dupescan/output-data/duplicates-formatted.txt",
//!   "strategy": "seek",
//!   "duplicates": [
//!     { "hash": "9f86d081884c7d65", "size": 1024, "files": ["/a.txt", "/b.txt"] }
//!   ],
//!   "summary": {
//!     "input_paths": 100,
//!     "total_files": 100,
//!     "duplicate_groups": 5,
//!     "reclaimable_space": 51200,
//!     "scan_duration_ms": 1234,
//!     "exit_code": 0,
//!     "exit_code_name": "DS000"
//!   }
//! }
//! ```
//!
//! The summary carries more fields than shown; see [`JsonSummary`].
//!
//! [`write_report_streamed`] produces the same document straight from the
//! report file, one group at a time, so the group list never has to fit in
//! memory. [`JsonOutput`] builds it from groups already loaded.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ExtractStrategy;
use crate::duplicates::{DuplicateGroup, FinderError, PathListing, ScanSummary};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// Truncated BLAKE3 hash as hexadecimal
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Paths of every member, in report order
    pub files: Vec<String>,
}

impl From<&DuplicateGroup> for JsonDuplicateGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash.clone(),
            size: group.size,
            files: group
                .members
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format, durations in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Non-blank paths read from the path source
    pub input_paths: u64,
    /// Regular files stat'd successfully
    pub total_files: u64,
    /// Total size of those files in bytes
    pub total_size: u64,
    /// Files skipped with a warning
    pub skipped_files: u64,
    /// Non-regular entries in the path source
    pub non_regular_files: u64,
    /// Files whose size was shared
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
    /// Times a writer made a producer wait
    pub backpressure_events: u64,
    /// Estimated truncated-hash collision probability
    pub collision_probability: f64,
    /// Duration of the entire scan
    pub scan_duration_ms: u64,
    /// Walk phase
    pub walk_duration_ms: u64,
    /// Size classification phase
    pub classify_duration_ms: u64,
    /// Hash phase
    pub hash_duration_ms: u64,
    /// Filter phase
    pub filter_duration_ms: u64,
    /// Extraction or sort phase
    pub extract_duration_ms: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DS000")
    pub exit_code_name: String,
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            input_paths: summary.input_paths,
            total_files: summary.total_files,
            total_size: summary.total_size,
            skipped_files: summary.skipped_files,
            non_regular_files: summary.non_regular_files,
            candidate_files: summary.candidate_files,
            hashed_files: summary.hashed_files,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            peak_in_flight: summary.peak_in_flight,
            backpressure_events: summary.backpressure_events,
            collision_probability: summary.collision_probability,
            scan_duration_ms: millis(summary.scan_duration),
            walk_duration_ms: millis(summary.timings.walk),
            classify_duration_ms: millis(summary.timings.classify),
            hash_duration_ms: millis(summary.timings.hash),
            filter_duration_ms: millis(summary.timings.filter),
            extract_duration_ms: millis(summary.timings.extract),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Complete JSON output of a duplicate scan.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// When the document was produced
    pub generated_at: DateTime<Utc>,
    /// The report file the groups were read from
    pub report_path: String,
    /// Strategy that produced the report
    pub strategy: ExtractStrategy,
    /// List of duplicate groups
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Create a JSON output from groups read back from `report_path`.
    ///
    /// # Example
    ///
    /// ```
    /// use dupescan::duplicates::{DuplicateGroup, ScanSummary};
    /// use dupescan::error::ExitCode;
    /// use dupescan::output::json::JsonOutput;
    /// use std::path::{Path, PathBuf};
    ///
    /// let groups = vec![DuplicateGroup::new(
    ///     "9f86d081884c7d65",
    ///     1024,
    ///     vec![PathBuf::from("/file1.txt"), PathBuf::from("/file2.txt")],
    /// )];
    /// let summary = ScanSummary::default();
    ///
    /// let output = JsonOutput::new(&groups, &summary, Path::new("report.txt"), ExitCode::Success);
    /// assert_eq!(output.duplicates.len(), 1);
    /// assert_eq!(output.duplicates[0].files.len(), 2);
    /// ```
    #[must_use]
    pub fn new(
        groups: &[DuplicateGroup],
        summary: &ScanSummary,
        report_path: &Path,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            report_path: report_path.to_string_lossy().into_owned(),
            strategy: summary.strategy,
            duplicates: groups.iter().map(JsonDuplicateGroup::from).collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// Write the scan document, pulling `groups` one at a time.
///
/// Returns the number of groups written.
///
/// # Errors
///
/// Returns an error if a group cannot be read, serialized, or written.
pub fn write_report_streamed<W, I>(
    writer: &mut W,
    groups: I,
    summary: &ScanSummary,
    report_path: &Path,
    exit_code: ExitCode,
) -> Result<u64, JsonOutputError>
where
    W: Write,
    I: IntoIterator<Item = Result<DuplicateGroup, FinderError>>,
{
    writeln!(writer, "{{")?;
    writeln!(
        writer,
        "  \"generated_at\": {},",
        serde_json::to_string(&Utc::now())?
    )?;
    writeln!(
        writer,
        "  \"report_path\": {},",
        serde_json::to_string(&report_path.to_string_lossy())?
    )?;
    writeln!(
        writer,
        "  \"strategy\": {},",
        serde_json::to_string(&summary.strategy)?
    )?;

    write!(writer, "  \"duplicates\": [")?;
    let mut written = 0u64;
    for group in groups {
        let group = group?;
        writer.write_all(if written == 0 { b"\n    " } else { b",\n    " })?;
        serde_json::to_writer(&mut *writer, &JsonDuplicateGroup::from(&group))?;
        written += 1;
    }
    if written > 0 {
        write!(writer, "\n  ")?;
    }
    writeln!(writer, "],")?;

    write!(writer, "  \"summary\": ")?;
    serde_json::to_writer(
        &mut *writer,
        &JsonSummary::from_scan_summary(summary, exit_code),
    )?;
    writeln!(writer, "\n}}")?;
    Ok(written)
}

/// JSON output of a listing-only run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonListing {
    /// When the document was produced
    pub generated_at: DateTime<Utc>,
    /// The written path list
    pub paths_file: String,
    /// Regular files listed
    pub files: u64,
    /// Their total size in bytes
    pub total_size: u64,
    /// Entries skipped with a warning
    pub skipped: u64,
    /// Duration of the walk in milliseconds
    pub walk_duration_ms: u64,
}

impl JsonListing {
    /// Create a listing document.
    #[must_use]
    pub fn new(listing: &PathListing) -> Self {
        Self {
            generated_at: Utc::now(),
            paths_file: listing.paths_file.to_string_lossy().into_owned(),
            files: listing.stats.files,
            total_size: listing.stats.total_size,
            skipped: listing.stats.skipped,
            walk_duration_ms: millis(listing.duration),
        }
    }

    /// Write JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)?;
    } else {
        serde_json::to_writer(&mut *writer, value)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),

    /// A group could not be read back from the report
    #[error(transparent)]
    Report(#[from] FinderError),
}
