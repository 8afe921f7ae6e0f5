//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! [`Walker`] performs a lazy, depth-first traversal of a root directory and
//! yields every regular file accepted by its [`AdmissionPredicate`]. The walk
//! is single-threaded and visits children in file-name order, so two walks of
//! an unchanged tree produce identical sequences.
//!
//! # Features
//!
//! - Symbolic links are never followed or yielded (no cycles)
//! - Hidden entries are pruned from traversal, not merely filtered
//! - Excluded directories (quarantine batches) are never entered
//! - Per-entry errors are yielded and traversal continues
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::scanner::{MinSize, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default(), MinSize(1));
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{AdmissionPredicate, FileEntry, ScanError, WalkerConfig};

/// Directory walker for ordered file discovery.
#[derive(Debug)]
pub struct Walker<P> {
    /// Root path to walk (canonicalized when possible)
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Admission predicate applied to every regular file
    predicate: P,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<P: AdmissionPredicate> Walker<P> {
    /// Create a new walker for the given path.
    ///
    /// The root is canonicalized so yielded paths are absolute; if that fails
    /// (for example, the root does not exist) the path is kept as given and
    /// the problem surfaces from [`Walker::validate_root`] or the walk itself.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig, predicate: P) -> Self {
        let root = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self {
            root,
            config,
            predicate,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set the walker stops before yielding the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// [`ScanError::NotFound`] or [`ScanError::NotADirectory`].
    pub fn validate_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(m) if m.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) => Err(handle_io_error(&self.root, e)),
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding admitted file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Each call re-reads the filesystem.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let excluded: Vec<PathBuf> = self
            .config
            .exclude_dirs
            .iter()
            .map(|d| std::fs::canonicalize(d).unwrap_or_else(|_| d.clone()))
            .collect();
        let skip_hidden = self.config.skip_hidden;

        let mut walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();
        if !self.config.recursive {
            walk_dir = walk_dir.max_depth(1);
        }

        walk_dir
            .into_iter()
            .filter_entry(move |entry| {
                // The root itself is never pruned, even if its own name is dotted.
                if entry.depth() == 0 {
                    return true;
                }
                if skip_hidden && is_hidden(entry) {
                    log::trace!("Pruning hidden entry: {}", entry.path().display());
                    return false;
                }
                if entry.file_type().is_dir() && excluded.iter().any(|d| d == entry.path()) {
                    log::debug!("Pruning excluded directory: {}", entry.path().display());
                    return false;
                }
                true
            })
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.process_entry(&entry),
                Err(e) => Some(Err(handle_walkdir_error(&self.root, e))),
            })
    }

    /// Turn a directory entry into a [`FileEntry`] if it is an admitted regular file.
    fn process_entry(&self, entry: &DirEntry) -> Option<Result<FileEntry, ScanError>> {
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            log::trace!("Skipping symlink: {}", entry.path().display());
            return None;
        }
        if !file_type.is_file() {
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => return Some(Err(handle_walkdir_error(entry.path(), e))),
        };
        let size = metadata.len();

        if !self.predicate.admit(entry.path(), size) {
            log::trace!("Not admitted ({} bytes): {}", size, entry.path().display());
            return None;
        }

        Some(Ok(FileEntry::new(entry.path().to_path_buf(), size)))
    }
}

/// Hidden means a leading dot on every platform, plus the hidden attribute on Windows.
fn is_hidden(entry: &DirEntry) -> bool {
    if entry.file_name().to_string_lossy().starts_with('.') {
        return true;
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        if let Ok(m) = entry.metadata() {
            return m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0;
        }
    }
    false
}

fn handle_io_error(path: &Path, error: std::io::Error) -> ScanError {
    match error.kind() {
        ErrorKind::PermissionDenied => {
            log::warn!("Permission denied: {}", path.display());
            ScanError::PermissionDenied(path.to_path_buf())
        }
        ErrorKind::NotFound => {
            log::debug!("Not found (may have been removed): {}", path.display());
            ScanError::NotFound(path.to_path_buf())
        }
        _ => {
            log::warn!("I/O error for {}: {}", path.display(), error);
            ScanError::Io {
                path: path.to_path_buf(),
                source: error,
            }
        }
    }
}

fn handle_walkdir_error(fallback: &Path, error: walkdir::Error) -> ScanError {
    let path = error
        .path()
        .map_or_else(|| fallback.to_path_buf(), Path::to_path_buf);
    match error.into_io_error() {
        Some(io) => handle_io_error(&path, io),
        None => {
            log::warn!("Filesystem loop detected at {}", path.display());
            ScanError::Io {
                path,
                source: std::io::Error::other("filesystem loop"),
            }
        }
    }
}
