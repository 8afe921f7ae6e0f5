//! Conflict-safe file relocation.
//!
//! # Overview
//!
//! This module holds the primitives shared by quarantine, restore and
//! duplicate separation:
//! - [`destination_for`]: structure-preserving or flattened destination
//! - [`unique_path`]: `name_N.ext` disambiguation against the filesystem
//! - [`move_file`]: rename with a copy-and-remove fallback across devices
//!
//! # Safety
//!
//! [`move_file`] never replaces an existing destination. Callers pick a free
//! name first; the move re-checks and fails with [`MoveError::DestinationExists`]
//! if the name was taken in between.
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::actions::{move_file, unique_path};
//! use std::path::Path;
//!
//! let dest = unique_path(Path::new("/backup/report.txt"), |p| p.exists()).unwrap();
//! move_file(Path::new("/data/report.txt"), &dest).unwrap();
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Upper bound on `_N` suffixes tried before giving up on a name.
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 10_000;

/// Error type for relocation operations.
#[derive(Debug, Error)]
pub enum MoveError {
    /// Source file was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when reading the source or writing the destination.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination appeared after it was chosen.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// No free disambiguated name could be found.
    #[error("no free name for {path} after {attempts} attempts")]
    CollisionExhausted {
        /// The name that was being disambiguated.
        path: PathBuf,
        /// Number of candidates tried.
        attempts: u32,
    },

    /// Relocation was skipped because shutdown was requested.
    #[error("interrupted before moving {0}")]
    Interrupted(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MoveError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::DestinationExists(p)
            | Self::Interrupted(p)
            | Self::CollisionExhausted { path: p, .. }
            | Self::Io { path: p, .. } => p,
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Self::DestinationExists(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Destination of `source` relative to a batch root.
///
/// With `preserve_structure` the path relative to `scan_root` is mirrored;
/// sources outside the scan root fall back to their base name, as does the
/// flattened mode.
#[must_use]
pub fn destination_for(source: &Path, scan_root: &Path, preserve_structure: bool) -> PathBuf {
    if preserve_structure {
        if let Ok(rel) = source.strip_prefix(scan_root) {
            if !rel.as_os_str().is_empty() {
                return rel.to_path_buf();
            }
        }
    }
    source
        .file_name()
        .map_or_else(|| PathBuf::from("unnamed"), PathBuf::from)
}

/// The `n`-th disambiguated sibling of `path`: `dir/stem_n.ext`.
#[must_use]
pub fn numbered_sibling(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

/// Return `path` if it is free, otherwise the first free `stem_N.ext` sibling.
///
/// `is_taken` decides occupancy, so callers can check the filesystem, an
/// in-memory plan, or both.
///
/// # Errors
///
/// [`MoveError::CollisionExhausted`] after [`MAX_DISAMBIGUATION_ATTEMPTS`].
pub fn unique_path(path: &Path, mut is_taken: impl FnMut(&Path) -> bool) -> Result<PathBuf, MoveError> {
    if !is_taken(path) {
        return Ok(path.to_path_buf());
    }
    for n in 1..=MAX_DISAMBIGUATION_ATTEMPTS {
        let candidate = numbered_sibling(path, n);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(MoveError::CollisionExhausted {
        path: path.to_path_buf(),
        attempts: MAX_DISAMBIGUATION_ATTEMPTS,
    })
}

/// Whether anything (file, dir, or dangling symlink) exists at `path`.
#[must_use]
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move `source` to `dest` without replacing anything at `dest`.
///
/// Parent directories of `dest` are created. A plain rename is tried first;
/// if it fails for a reason other than a missing source or denied access
/// (typically a cross-device move) the file is copied and the source removed.
///
/// Returns the size of the moved file.
///
/// # Errors
///
/// [`MoveError`] describing the first failure. On a failed copy fallback any
/// partial destination is removed and the source is left in place.
pub fn move_file(source: &Path, dest: &Path) -> Result<u64, MoveError> {
    let metadata = fs::symlink_metadata(source).map_err(|e| MoveError::from_io(source, e))?;
    let size = metadata.len();

    if path_occupied(dest) {
        return Err(MoveError::DestinationExists(dest.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| MoveError::from_io(parent, e))?;
    }

    match fs::rename(source, dest) {
        Ok(()) => {
            log::debug!("Moved {} -> {}", source.display(), dest.display());
            Ok(size)
        }
        Err(e) if matches!(
            e.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
        ) =>
        {
            Err(MoveError::from_io(source, e))
        }
        Err(e) => {
            log::debug!(
                "Rename {} -> {} failed ({}), falling back to copy",
                source.display(),
                dest.display(),
                e
            );
            copy_then_remove(source, dest).map(|()| size)
        }
    }
}

fn copy_then_remove(source: &Path, dest: &Path) -> Result<(), MoveError> {
    // create_new refuses to clobber a destination that appeared meanwhile.
    let mut out = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| MoveError::from_io(dest, e))?;
    let copied = fs::File::open(source)
        .and_then(|mut input| io::copy(&mut input, &mut out))
        .and_then(|_| out.sync_all());
    drop(out);

    if let Err(e) = copied {
        let _ = fs::remove_file(dest);
        return Err(MoveError::from_io(source, e));
    }
    if let Ok(meta) = fs::metadata(source) {
        let _ = fs::set_permissions(dest, meta.permissions());
    }
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(dest);
        return Err(MoveError::from_io(source, e));
    }
    log::debug!("Copied and removed {} -> {}", source.display(), dest.display());
    Ok(())
}
