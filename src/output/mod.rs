//! Output formatters for scan results.
//!
//! - Text: a short human-readable summary on stdout; the groups themselves
//!   stay in the report file
//! - JSON: groups streamed back from the report plus the summary, see [`json`]
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::DuplicateFinder;
//! use dupescan::output::write_scan_text;
//! use dupescan::scanner::WalkerConfig;
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let report = finder
//!     .find_duplicates_in_paths(&[PathBuf::from(".")], WalkerConfig::default())
//!     .unwrap();
//! write_scan_text(&mut std::io::stdout(), &report).unwrap();
//! ```

pub mod json;

use std::io::{self, Write};

use bytesize::ByteSize;

use crate::duplicates::{PathListing, ScanReport};

pub use json::{write_report_streamed, JsonListing, JsonOutput};

/// Print the summary of a duplicate scan.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_scan_text<W: Write>(out: &mut W, report: &ScanReport) -> io::Result<()> {
    let s = &report.summary;
    writeln!(
        out,
        "Scanned {} files ({}) from {} paths",
        s.total_files,
        s.total_size_display(),
        s.input_paths
    )?;
    if s.skipped_files > 0 || s.non_regular_files > 0 {
        writeln!(
            out,
            "Skipped {} unreadable files and {} non-regular entries",
            s.skipped_files, s.non_regular_files
        )?;
    }
    writeln!(
        out,
        "Hashed {} of {} size candidates (peak {} in flight)",
        s.hashed_files, s.candidate_files, s.peak_in_flight
    )?;

    if s.has_duplicates() {
        writeln!(
            out,
            "Found {} duplicate groups with {} redundant files, {} reclaimable ({:.1}%)",
            s.duplicate_groups,
            s.duplicate_files,
            s.reclaimable_display(),
            s.wasted_percentage()
        )?;
    } else {
        writeln!(out, "No duplicates found")?;
    }
    writeln!(out, "Report ({}): {}", s.strategy, report.report_path.display())?;
    writeln!(out, "Completed in {:.2?}", s.scan_duration)
}

/// Print the summary of a listing-only run.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_listing_text<W: Write>(out: &mut W, listing: &PathListing) -> io::Result<()> {
    writeln!(
        out,
        "Listed {} files ({}) in {:.2?}",
        listing.stats.files,
        ByteSize(listing.stats.total_size),
        listing.duration
    )?;
    if listing.stats.skipped > 0 {
        writeln!(out, "Skipped {} entries", listing.stats.skipped)?;
    }
    writeln!(out, "Path list: {}", listing.paths_file.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::{ReportLayout, ScanSummary};
    use crate::scanner::WalkStats;
    use std::path::PathBuf;
    use std::time::Duration;

    fn report(summary: ScanSummary) -> ScanReport {
        ScanReport {
            summary,
            report_path: PathBuf::from("/out/duplicates-formatted.txt"),
            layout: ReportLayout::Grouped,
            output_dir: PathBuf::from("/out"),
        }
    }

    fn render(report: &ScanReport) -> String {
        let mut buf = Vec::new();
        write_scan_text(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_scan_text_with_duplicates() {
        let text = render(&report(ScanSummary {
            total_files: 4,
            input_paths: 4,
            total_size: 40,
            candidate_files: 4,
            hashed_files: 4,
            duplicate_groups: 1,
            duplicate_files: 1,
            reclaimable_space: 10,
            ..ScanSummary::default()
        }));
        assert!(text.contains("Scanned 4 files"));
        assert!(text.contains("Found 1 duplicate groups with 1 redundant files"));
        assert!(text.contains("(25.0%)"));
        assert!(text.contains("Report (seek): /out/duplicates-formatted.txt"));
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn test_scan_text_without_duplicates() {
        let text = render(&report(ScanSummary {
            skipped_files: 2,
            ..ScanSummary::default()
        }));
        assert!(text.contains("No duplicates found"));
        assert!(text.contains("Skipped 2 unreadable files"));
    }

    #[test]
    fn test_listing_text() {
        let listing = PathListing {
            stats: WalkStats {
                files: 3,
                total_size: 35,
                skipped: 0,
                ..WalkStats::default()
            },
            paths_file: PathBuf::from("/out/paths.txt"),
            duration: Duration::from_millis(12),
        };
        let mut buf = Vec::new();
        write_listing_text(&mut buf, &listing).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Listed 3 files"));
        assert!(text.contains("Path list: /out/paths.txt"));
    }
}
