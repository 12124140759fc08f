//! Scanner module: the path source and the content hasher.
//!
//! This module provides functionality for:
//! - Walking scan roots and writing the line-delimited path list
//! - Streaming BLAKE3 content hashing with a truncated digest
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal with an exclusion list
//! - [`file_id`]: Device/inode tracking so followed links are listed once
//! - [`hasher`]: Truncated BLAKE3 file hashing (streaming)
//!
//! Per-file failures are split into skippable ones (file vanished,
//! permission denied, path is a directory) and everything else; see
//! [`ScanError::is_skippable`] and [`HashError::is_skippable`].

pub mod file_id;
pub mod hasher;
pub mod walker;

use std::io;
use std::path::{Path, PathBuf};

// Re-export main types
pub use hasher::{collision_probability, Hasher, DEFAULT_HASH_WIDTH, MAX_HASH_WIDTH, MIN_HASH_WIDTH};
pub use file_id::FileIdTracker;
pub use walker::{WalkStats, Walker};

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    ///
    /// A file reached both directly and through a link is listed once.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Directories to leave out of the walk.
    ///
    /// An absolute entry excludes that directory and everything below it;
    /// a bare name excludes every directory with that name.
    pub exclude: Vec<String>,
}

impl WalkerConfig {
    /// Create a configuration with an exclusion list.
    #[must_use]
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }
}

/// Errors that can occur while statting or walking paths.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The path cannot be written to a line-delimited file.
    #[error("Unrepresentable path: {0}")]
    Unrepresentable(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Classify a `stat` failure.
    #[must_use]
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether the file can be dropped with a warning instead of aborting.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::PermissionDenied(_) | Self::Unrepresentable(_)
        )
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path turned out to be a directory.
    #[error("Is a directory: {0}")]
    IsADirectory(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an open/read failure.
    #[must_use]
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::IsADirectory => Self::IsADirectory(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether the file can be dropped with a warning instead of aborting.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}
