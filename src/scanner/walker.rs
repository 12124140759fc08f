//! Directory walker producing the line-delimited path list.
//!
//! # Overview
//!
//! The walker is the pipeline's path source. It traverses every scan root
//! with [`jwalk`], drops excluded directories before descending into them,
//! and streams one absolute path per regular file into a
//! [`WriteHandle`]. Nothing but the current directory batch is held in
//! memory, so the path list may be far larger than RAM.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::io::WriteQueue;
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use std::path::{Path, PathBuf};
//!
//! let config = WalkerConfig::default().with_exclude(vec!["node_modules".to_string()]);
//! let walker = Walker::new(vec![PathBuf::from(".")], config);
//!
//! let queue = WriteQueue::create(Path::new("paths.txt"), 1024).unwrap();
//! let stats = walker.write_paths(&queue.handle()).unwrap();
//! queue.finish().unwrap();
//! println!("{} files listed", stats.files);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{FileIdTracker, ScanError, WalkerConfig};
use crate::io::{WriteHandle, WriteQueueError};

/// Counters of one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Regular files written to the path list
    pub files: u64,
    /// Sum of their sizes in bytes
    pub total_size: u64,
    /// Directories and files skipped because of errors or unrepresentable paths
    pub skipped: u64,
    /// Files reached a second time through a followed symlink
    pub linked_repeats: u64,
    /// Whether the walk stopped because of a shutdown request
    pub interrupted: bool,
}

/// Parsed exclusion list.
#[derive(Debug, Clone, Default)]
struct Exclusions {
    absolute: Vec<PathBuf>,
    names: Vec<String>,
}

impl Exclusions {
    fn new(entries: &[String]) -> Self {
        let mut exclusions = Self::default();
        for entry in entries {
            let trimmed = entry.trim_end_matches(std::path::MAIN_SEPARATOR);
            if trimmed.is_empty() {
                continue;
            }
            let path = Path::new(trimmed);
            if path.is_absolute() {
                // Roots are canonicalised, so compare against the canonical form.
                let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                exclusions.absolute.push(canonical);
            } else {
                exclusions.names.push(trimmed.to_string());
            }
        }
        exclusions
    }

    fn matches(&self, dir: &Path) -> bool {
        if self.absolute.iter().any(|excluded| dir.starts_with(excluded)) {
            return true;
        }
        dir.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.names.iter().any(|n| n == name))
    }
}

/// Walker over one or more scan roots.
#[derive(Debug)]
pub struct Walker {
    roots: Vec<PathBuf>,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker for the given roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: WalkerConfig) -> Self {
        Self {
            roots,
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Canonicalise and check every root.
    ///
    /// A root equal to or nested inside another root is dropped, so no
    /// file is listed twice.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`] for
    /// the first root that cannot be walked.
    pub fn validate_roots(&self) -> Result<Vec<PathBuf>, ScanError> {
        let canonical = self
            .roots
            .iter()
            .map(|root| {
                let canonical = fs::canonicalize(root).map_err(|e| ScanError::from_io(root, e))?;
                if !canonical.is_dir() {
                    return Err(ScanError::NotADirectory(root.clone()));
                }
                Ok(canonical)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut roots: Vec<PathBuf> = Vec::with_capacity(canonical.len());
        for (i, root) in canonical.iter().enumerate() {
            let covered = canonical.iter().enumerate().any(|(j, other)| {
                (other != root && root.starts_with(other)) || (other == root && j < i)
            });
            if covered {
                log::debug!("Root {} is already covered by another root", root.display());
            } else {
                roots.push(root.clone());
            }
        }
        Ok(roots)
    }

    /// Walk every root and write each regular file's absolute path.
    ///
    /// Walk errors on individual entries are logged and counted, not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::Root`] if a root is invalid and
    /// [`WalkError::Writer`] if the path list cannot be written.
    pub fn write_paths(&self, out: &WriteHandle) -> Result<WalkStats, WalkError> {
        let roots = self.validate_roots()?;
        let exclusions = Arc::new(Exclusions::new(&self.config.exclude));
        let mut stats = WalkStats::default();
        // Identity is only needed when links can lead back to a listed file.
        let mut listed = self.config.follow_symlinks.then(FileIdTracker::new);

        for root in roots {
            if exclusions.matches(&root) {
                log::info!("Skipping excluded root {}", root.display());
                continue;
            }
            log::debug!("Walking {}", root.display());

            let filter = Arc::clone(&exclusions);
            let walk = WalkDir::new(&root)
                .follow_links(self.config.follow_symlinks)
                .skip_hidden(self.config.skip_hidden)
                .process_read_dir(move |_depth, _path, _state, children| {
                    children.retain(|child| match child {
                        Ok(entry) => !(entry.file_type().is_dir() && filter.matches(&entry.path())),
                        Err(_) => true,
                    });
                    children.sort_by(|a, b| match (a, b) {
                        (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                    });
                });

            for entry in walk {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    stats.interrupted = true;
                    return Ok(stats);
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Walk error: {}", e);
                        stats.skipped += 1;
                        continue;
                    }
                };

                // Symlinks are only listed when followed, as their targets.
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let meta = match fs::metadata(&path) {
                    Ok(meta) if meta.is_file() => meta,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!("Skipping {}: {}", path.display(), e);
                        stats.skipped += 1;
                        continue;
                    }
                };
                if let Some(ref mut tracker) = listed {
                    if !tracker.first_sighting(&meta) {
                        log::debug!("Already listed through another path: {}", path.display());
                        stats.linked_repeats += 1;
                        continue;
                    }
                }
                let size = meta.len();

                match line_path(&path) {
                    Ok(line) => {
                        out.write_line(line)?;
                        stats.files += 1;
                        stats.total_size += size;
                    }
                    Err(e) => {
                        log::warn!("{}", e);
                        stats.skipped += 1;
                    }
                }
            }
        }

        log::info!(
            "Walk complete: {} files, {} skipped, {} repeated through links",
            stats.files,
            stats.skipped,
            stats.linked_repeats
        );
        Ok(stats)
    }
}

/// Render a path for a line-delimited file.
///
/// # Errors
///
/// Returns [`ScanError::Unrepresentable`] for non-UTF-8 paths and paths
/// containing a line break. A carriage return counts as one, since path
/// lists may use CRLF endings and readers strip a trailing `\r`.
pub fn line_path(path: &Path) -> Result<&str, ScanError> {
    match path.to_str() {
        Some(s) if !s.is_empty() && !s.contains(['\n', '\r']) => Ok(s),
        _ => Err(ScanError::Unrepresentable(path.to_path_buf())),
    }
}

/// Errors that end a walk.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    /// A scan root is missing or not a directory.
    #[error(transparent)]
    Root(#[from] ScanError),

    /// The path list could not be written.
    #[error(transparent)]
    Writer(#[from] WriteQueueError),
}
