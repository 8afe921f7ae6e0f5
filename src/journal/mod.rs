//! Journal module: the per-batch record of every relocation.
//!
//! Each quarantine batch carries exactly one journal file
//! ([`JOURNAL_FILE_NAME`]) listing, in order, every [`FileRecord`] produced
//! while the batch was created. Restores append `restored` records; existing
//! records are never rewritten or removed, so the file doubles as an audit
//! trail.
//!
//! # Architecture
//!
//! * [`data`]: Serializable record model and timestamp format.
//! * [`io`]: Loading, atomic writing and appending of journal files.

pub mod data;
pub mod io;

use std::path::PathBuf;

pub use data::{now, FileRecord, RecordAction, TIME_FORMAT};
pub use io::{Journal, JOURNAL_FILE_NAME};

/// Errors raised while reading or writing a journal.
///
/// A missing or unreadable journal is fatal for a restore: without it there
/// is no record of where files came from.
#[derive(thiserror::Error, Debug)]
pub enum JournalError {
    /// The journal file does not exist.
    #[error("journal not found: {0}")]
    NotFound(PathBuf),

    /// The journal exists but is not valid JSON in the expected shape.
    #[error("journal is corrupt: {path}: {source}")]
    Corrupt {
        /// Journal path
        path: PathBuf,
        /// Parse failure
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the journal failed.
    #[error("journal I/O error for {path}: {source}")]
    Io {
        /// Journal path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
