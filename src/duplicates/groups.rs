//! Duplicate grouping and size-based file organization.
//!
//! # Overview
//!
//! Size grouping is the first phase of duplicate detection: files with
//! different sizes cannot be duplicates, so only sizes shared by two or more
//! files survive. Groups keep the order in which their sizes were first seen,
//! and files inside a group keep traversal order, so later phases can pick
//! the earliest-traversed member as the original.
//!
//! # Example
//!
//! ```
//! use rustquarantine::scanner::FileEntry;
//! use rustquarantine::duplicates::group_by_size;
//! use std::path::PathBuf;
//!
//! let files = vec![
//!     FileEntry::new(PathBuf::from("/file1.txt"), 1024),
//!     FileEntry::new(PathBuf::from("/file2.txt"), 2048),
//!     FileEntry::new(PathBuf::from("/file3.txt"), 1024),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].files[1].path, PathBuf::from("/file3.txt"));
//! ```

use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::scanner::{hash_to_hex, FileEntry, Hash};

/// A group of files with the same size.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    /// File size in bytes (shared by all files in this group)
    pub size: u64,
    /// Files with this exact size, in traversal order
    pub files: Vec<FileEntry>,
}

impl SizeGroup {
    /// Create an empty size group.
    #[must_use]
    pub fn new(size: u64) -> Self {
        Self {
            size,
            files: Vec::new(),
        }
    }

    /// Create a size group with initial files.
    #[must_use]
    pub fn with_files(size: u64, files: Vec<FileEntry>) -> Self {
        Self { size, files }
    }

    /// Add a file to this group.
    ///
    /// # Panics
    ///
    /// Debug assertion fails if file size doesn't match group size.
    pub fn add(&mut self, file: FileEntry) {
        debug_assert_eq!(
            file.size, self.size,
            "File size {} doesn't match group size {}",
            file.size, self.size
        );
        self.files.push(file);
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check if this group has potential duplicates (2+ files).
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.files.len() > 1
    }

    /// Potential space savings (all copies minus one).
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.files.len().saturating_sub(1) as u64)
    }
}

/// Confirmed duplicate group: files with identical size and content hash.
///
/// `members[0]` is the original (earliest traversed); the rest are
/// duplicates in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// BLAKE3 hash of the file content
    #[serde(serialize_with = "serialize_hex")]
    pub fingerprint: Hash,
    /// File size in bytes, shared by every member
    pub size: u64,
    /// Members in traversal order
    pub members: Vec<FileEntry>,
}

fn serialize_hex<S: Serializer>(hash: &Hash, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hash_to_hex(hash))
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(fingerprint: Hash, size: u64, members: Vec<FileEntry>) -> Self {
        Self {
            fingerprint,
            size,
            members,
        }
    }

    /// The earliest-traversed member.
    #[must_use]
    pub fn original(&self) -> Option<&FileEntry> {
        self.members.first()
    }

    /// Every member except the original.
    #[must_use]
    pub fn duplicates(&self) -> &[FileEntry] {
        self.members.get(1..).unwrap_or(&[])
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

    /// Bytes taken up by the duplicates.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicates().len() as u64
    }

    /// Fingerprint as a hex string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.fingerprint)
    }
}

/// Statistics from size grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files processed
    pub total_files: usize,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Number of unique file sizes
    pub unique_sizes: usize,
    /// Number of files that could be duplicates (in groups of 2+)
    pub potential_duplicates: usize,
    /// Number of files eliminated as unique (singleton groups)
    pub eliminated_unique: usize,
    /// Number of size groups with 2+ files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group files by exact size, dropping sizes seen only once.
///
/// Groups are ordered by the position of their first file; files keep their
/// input order.
pub fn group_by_size(files: impl IntoIterator<Item = FileEntry>) -> (Vec<SizeGroup>, GroupingStats) {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut all_groups: Vec<SizeGroup> = Vec::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_size += file.size;

        let slot = *index.entry(file.size).or_insert_with(|| {
            all_groups.push(SizeGroup::new(file.size));
            all_groups.len() - 1
        });
        all_groups[slot].add(file);
    }

    stats.unique_sizes = all_groups.len();

    let groups: Vec<SizeGroup> = all_groups
        .into_iter()
        .filter(|group| {
            if group.has_duplicates() {
                stats.potential_duplicates += group.len();
                stats.duplicate_groups += 1;
                log::debug!(
                    "Size group {} bytes: {} potential duplicates",
                    group.size,
                    group.len()
                );
                true
            } else {
                stats.eliminated_unique += group.len();
                log::trace!("Eliminated unique size {}", group.size);
                false
            }
        })
        .collect();

    log::info!(
        "Size grouping: {} files, {} potential duplicates in {} groups ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.duplicate_groups,
        stats.elimination_rate()
    );

    (groups, stats)
}
