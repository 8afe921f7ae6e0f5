//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] computes content fingerprints by reading files in fixed-size
//! chunks, so memory use stays bounded regardless of file size. Two modes:
//!
//! - [`Hasher::prehash`]: first [`PREHASH_SIZE`] bytes only, a cheap filter
//! - [`Hasher::full_hash`]: entire content, the fingerprint used for grouping
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::scanner::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.full_hash(Path::new("Cargo.toml")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Number of leading bytes hashed by [`Hasher::prehash`].
pub const PREHASH_SIZE: usize = 4096;

/// Default read buffer for full hashing.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 64 KiB read buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_flag: None,
        }
    }

    /// Override the read buffer size. Values below 1 KiB are clamped.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1024);
        self
    }

    /// Set the shutdown flag checked between chunks.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Configured read buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the first [`PREHASH_SIZE`] bytes of a file.
    ///
    /// Files shorter than the prehash window hash to the same value as
    /// [`Hasher::full_hash`].
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn prehash(&self, path: &Path) -> Result<Hash, HashError> {
        prehash_reader(path, open(path)?)
    }

    /// Hash the entire content of a file by streaming fixed-size chunks.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read, or
    /// [`HashError::Interrupted`] when shutdown is requested mid-file.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(path, e)),
            };
            hasher.update(&buf[..n]);
        }
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Hash the first [`PREHASH_SIZE`] bytes of `reader`.
fn prehash_reader(path: &Path, reader: impl Read) -> Result<Hash, HashError> {
    let mut buf = vec![0u8; PREHASH_SIZE];
    let mut limited = reader.take(PREHASH_SIZE as u64);
    let mut filled = 0;
    loop {
        match limited.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_io_error(path, e)),
        }
    }
    Ok(*blake3::hash(&buf[..filled]).as_bytes())
}

fn open(path: &Path) -> Result<File, HashError> {
    File::open(path).map_err(|e| map_io_error(path, e))
}

fn map_io_error(path: &Path, error: io::Error) -> HashError {
    match error.kind() {
        io::ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => HashError::PermissionDenied(path.to_path_buf()),
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

/// Format a hash as lowercase hexadecimal.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from_bytes(*hash).to_hex().to_string()
}

/// Parse a 64-character hexadecimal string back into a hash.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}
