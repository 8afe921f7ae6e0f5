//! Batch directories: naming, creation and lookup.
//!
//! A batch is named `quarantine-YYYYMMDD-HHMMSS` from its creation time. When
//! that name is taken (several runs within one second) a zero-padded sequence
//! suffix is appended: `-001`, `-002`, ... so names still sort
//! lexicographically in creation order.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::QuarantineError;
use crate::journal::{Journal, JournalError};

/// Directory name prefix of every batch.
pub const BATCH_PREFIX: &str = "quarantine-";

/// Highest collision suffix tried before batch creation fails.
pub const MAX_BATCH_SEQUENCE: u32 = 999;

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Parsed batch name. Ordering follows creation time, then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId {
    /// Creation time, second precision.
    pub created: NaiveDateTime,
    /// Collision suffix, `0` when absent.
    pub sequence: u32,
}

impl BatchId {
    /// Batch id for a creation time, without suffix.
    #[must_use]
    pub fn new(created: NaiveDateTime) -> Self {
        Self {
            created,
            sequence: 0,
        }
    }

    /// The next collision candidate, or `None` past [`MAX_BATCH_SEQUENCE`].
    #[must_use]
    pub fn next(self) -> Option<Self> {
        (self.sequence < MAX_BATCH_SEQUENCE).then(|| Self {
            sequence: self.sequence + 1,
            ..self
        })
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BATCH_PREFIX}{}", self.created.format(STAMP_FORMAT))?;
        if self.sequence > 0 {
            write!(f, "-{:03}", self.sequence)?;
        }
        Ok(())
    }
}

/// Error for names that are not batch names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a batch name: {0}")]
pub struct InvalidBatchName(pub String);

impl FromStr for BatchId {
    type Err = InvalidBatchName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidBatchName(s.to_string());
        let rest = s.strip_prefix(BATCH_PREFIX).ok_or_else(invalid)?;

        // "YYYYMMDD-HHMMSS" is 15 characters; anything after is "-NNN".
        let (stamp, suffix) = rest.split_at_checked(15).ok_or_else(invalid)?;
        let created = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).map_err(|_| invalid())?;
        let sequence = match suffix {
            "" => 0,
            _ => suffix
                .strip_prefix('-')
                .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                .and_then(|n| n.parse().ok())
                .ok_or_else(invalid)?,
        };
        Ok(Self { created, sequence })
    }
}

/// An existing batch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Parsed name.
    pub id: BatchId,
    /// Absolute path of the batch directory.
    pub root: PathBuf,
}

impl Batch {
    /// Create a new batch directory under `base`.
    ///
    /// The directory is created with an exclusive create; if `id` is taken,
    /// successive sequence suffixes are tried.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::CreateBatch`] on I/O failure,
    /// [`QuarantineError::BatchNamesExhausted`] if every suffix is taken.
    pub fn create(base: &Path, id: BatchId) -> Result<Self, QuarantineError> {
        fs::create_dir_all(base).map_err(|source| QuarantineError::CreateBatch {
            path: base.to_path_buf(),
            source,
        })?;
        let base = fs::canonicalize(base).map_err(|source| QuarantineError::CreateBatch {
            path: base.to_path_buf(),
            source,
        })?;

        let mut id = id;
        loop {
            let root = base.join(id.to_string());
            match fs::create_dir(&root) {
                Ok(()) => {
                    log::info!("Created batch {}", root.display());
                    return Ok(Self { id, root });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    log::debug!("Batch name taken: {}", root.display());
                    id = id
                        .next()
                        .ok_or_else(|| QuarantineError::BatchNamesExhausted(base.join(id.to_string())))?;
                }
                Err(source) => return Err(QuarantineError::CreateBatch { path: root, source }),
            }
        }
    }

    /// Open an existing batch directory by path.
    ///
    /// Returns `None` if the path is not a directory or its name is not a batch name.
    #[must_use]
    pub fn open(path: &Path) -> Option<Self> {
        if !path.is_dir() {
            return None;
        }
        let id = path.file_name()?.to_str()?.parse().ok()?;
        let root = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Some(Self { id, root })
    }

    /// Batch directory name.
    #[must_use]
    pub fn name(&self) -> String {
        self.id.to_string()
    }

    /// Load this batch's journal.
    ///
    /// # Errors
    ///
    /// Any [`JournalError`].
    pub fn journal(&self) -> Result<Journal, JournalError> {
        Journal::load(&self.root)
    }
}

/// All batches directly under `base`, oldest first.
///
/// A missing base yields an empty list.
///
/// # Errors
///
/// I/O errors from reading `base`.
pub fn list_batches(base: &Path) -> io::Result<Vec<Batch>> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut batches = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(batch) = Batch::open(&entry.path()) {
            batches.push(batch);
        }
    }
    batches.sort_by_key(|b| b.id);
    Ok(batches)
}

/// The most recently created batch under `base`.
///
/// # Errors
///
/// I/O errors from reading `base`.
pub fn latest_batch(base: &Path) -> io::Result<Option<Batch>> {
    Ok(list_batches(base)?.pop())
}

/// A batch plus its record count, for listings.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// The batch.
    pub batch: Batch,
    /// Number of journal records, `None` when the journal is missing or corrupt.
    pub records: Option<usize>,
}

/// Summaries of all batches under `base`, oldest first.
///
/// # Errors
///
/// I/O errors from reading `base`.
pub fn summarize_batches(base: &Path) -> io::Result<Vec<BatchSummary>> {
    Ok(list_batches(base)?
        .into_iter()
        .map(|batch| {
            let records = match batch.journal() {
                Ok(journal) => Some(journal.len()),
                Err(e) => {
                    log::warn!("{}: {}", batch.root.display(), e);
                    None
                }
            };
            BatchSummary { batch, records }
        })
        .collect())
}
