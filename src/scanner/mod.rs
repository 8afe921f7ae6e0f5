//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Ordered, single-threaded directory walking using walkdir
//! - Content hashing with BLAKE3 (streaming, bounded memory)
//! - Pluggable admission predicates (empty files, minimum size)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::scanner::{EmptyFile, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config, EmptyFile);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("empty: {}", file.path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::path::{Path, PathBuf};

use serde::Serialize;

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, PREHASH_SIZE};
pub use walker::Walker;

/// Metadata for a discovered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Decides whether a discovered regular file is admitted into the scan output.
///
/// Any `Fn(&Path, u64) -> bool` closure is a predicate, so callers can inject
/// their own rules without touching the walker.
pub trait AdmissionPredicate {
    /// Return `true` to yield the file.
    fn admit(&self, path: &Path, size: u64) -> bool;
}

impl<F> AdmissionPredicate for F
where
    F: Fn(&Path, u64) -> bool,
{
    fn admit(&self, path: &Path, size: u64) -> bool {
        self(path, size)
    }
}

/// Admits zero-byte files. This is the quarantine predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFile;

impl AdmissionPredicate for EmptyFile {
    fn admit(&self, _path: &Path, size: u64) -> bool {
        size == 0
    }
}

/// Admits files of at least the given size. Used by duplicate detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinSize(pub u64);

impl AdmissionPredicate for MinSize {
    fn admit(&self, _path: &Path, size: u64) -> bool {
        size >= self.0
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Prune hidden files and directories (names starting with `.`, or the
    /// hidden attribute on Windows). Pruned directories are not descended.
    pub skip_hidden: bool,

    /// Descend into subdirectories. When `false` only direct children of the
    /// root are considered.
    pub recursive: bool,

    /// Directories that are never entered (quarantine batches, duplicates dir).
    pub exclude_dirs: Vec<PathBuf>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            skip_hidden: false,
            recursive: true,
            exclude_dirs: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(skip_hidden: bool, recursive: bool) -> Self {
        Self {
            skip_hidden,
            recursive,
            exclude_dirs: Vec::new(),
        }
    }

    /// Add a directory that the walker must not enter.
    #[must_use]
    pub fn with_excluded_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.exclude_dirs.push(dir.into());
        self
    }
}

/// Errors that can occur during directory scanning.
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

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file could not be hashed during duplicate detection.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
            Self::Hash(e) => e.path(),
        }
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

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Interrupted(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
