//! Physical file identity, used to list each file once when the walk
//! follows symbolic links.
//!
//! A followed link and its target are two directory entries for the same
//! file. Listing both would make a file a duplicate of itself, so the
//! walker records the `(device, inode)` pair of every file it lists and
//! drops later sightings.
//!
//! Only Unix exposes the identity through metadata; elsewhere every file
//! counts as new.

use std::collections::HashSet;
use std::fs::Metadata;

/// Set of files already listed, keyed by device and inode.
#[derive(Debug, Default)]
pub struct FileIdTracker {
    seen: HashSet<FileId>,
}

impl FileIdTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the file behind `metadata`; `false` if it was already seen.
    pub fn first_sighting(&mut self, metadata: &Metadata) -> bool {
        match FileId::from_metadata(metadata) {
            Some(id) => self.seen.insert(id),
            None => true,
        }
    }

    /// Files recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}
