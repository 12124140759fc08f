//! Run-scoped output directory.
//!
//! Every intermediate file of one run lives directly in the output
//! directory under a fixed name; sort chunks go to a `chunks/`
//! subdirectory. Scratch files left by an earlier run are removed when a
//! new run opens the workspace. Final reports are never removed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Path list written by the walker.
pub const PATHS_FILE: &str = "paths.txt";
/// `<size> <path>` records.
pub const SIZES_FILE: &str = "sizes.txt";
/// `<hash> <size> <path>` records.
pub const HASHES_FILE: &str = "hashes.txt";
/// Hash records of duplicate keys only.
pub const DUPLICATES_FILE: &str = "duplicates.txt";
/// Grouped blocks produced by seek extraction.
pub const FORMATTED_REPORT: &str = "duplicates-formatted.txt";
/// Sorted records produced by the external sort.
pub const SORTED_REPORT: &str = "duplicates-sorted.txt";
/// Directory holding numbered sort chunks.
pub const CHUNKS_DIR: &str = "chunks";

const SCRATCH_FILES: [&str; 4] = [PATHS_FILE, SIZES_FILE, HASHES_FILE, DUPLICATES_FILE];

/// File layout of one run.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    root: PathBuf,
}

impl RunWorkspace {
    /// Create the output directory if needed and clear stale scratch state.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or a stale
    /// file cannot be removed.
    pub fn open(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let workspace = Self {
            root: root.to_path_buf(),
        };
        let removed = workspace.remove_scratch(true)?;
        if removed > 0 {
            log::debug!(
                "Removed {} stale scratch file(s) from {}",
                removed,
                root.display()
            );
        }
        Ok(workspace)
    }

    /// Output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walker output.
    #[must_use]
    pub fn paths_file(&self) -> PathBuf {
        self.root.join(PATHS_FILE)
    }

    /// Size classifier output.
    #[must_use]
    pub fn sizes_file(&self) -> PathBuf {
        self.root.join(SIZES_FILE)
    }

    /// Hasher output.
    #[must_use]
    pub fn hashes_file(&self) -> PathBuf {
        self.root.join(HASHES_FILE)
    }

    /// Filter-driven duplicates file.
    #[must_use]
    pub fn duplicates_file(&self) -> PathBuf {
        self.root.join(DUPLICATES_FILE)
    }

    /// Seek extraction report.
    #[must_use]
    pub fn formatted_report(&self) -> PathBuf {
        self.root.join(FORMATTED_REPORT)
    }

    /// External sort report.
    #[must_use]
    pub fn sorted_report(&self) -> PathBuf {
        self.root.join(SORTED_REPORT)
    }

    /// Directory for sort chunks, created on demand.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn chunks_dir(&self) -> io::Result<PathBuf> {
        let dir = self.root.join(CHUNKS_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Remove intermediate files after a run. The path list is kept when it
    /// was supplied by the caller rather than produced by the walker.
    ///
    /// # Errors
    ///
    /// Returns the first removal error other than `NotFound`.
    pub fn cleanup_scratch(&self, keep_paths: bool) -> io::Result<usize> {
        self.remove_scratch(!keep_paths)
    }

    fn remove_scratch(&self, include_paths: bool) -> io::Result<usize> {
        let mut removed = 0;
        for name in SCRATCH_FILES {
            if name == PATHS_FILE && !include_paths {
                continue;
            }
            if remove_if_exists(&self.root.join(name))? {
                removed += 1;
            }
        }
        match fs::remove_dir_all(self.root.join(CHUNKS_DIR)) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(removed)
    }
}

/// Remove a file, treating a missing file as success.
///
/// # Errors
///
/// Returns any removal error other than `NotFound`.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
