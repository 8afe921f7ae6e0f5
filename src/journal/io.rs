//! I/O operations for batch journals.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::data::{FileRecord, RecordAction};
use super::JournalError;

/// File name of the journal inside every batch directory.
pub const JOURNAL_FILE_NAME: &str = "metadata.json";

/// A loaded journal: the ordered records of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    /// Records in the order they were written.
    pub records: Vec<FileRecord>,
}

impl Journal {
    /// Wrap a list of records.
    #[must_use]
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    /// Journal path for a batch directory.
    #[must_use]
    pub fn path_in(batch_dir: &Path) -> PathBuf {
        batch_dir.join(JOURNAL_FILE_NAME)
    }

    /// Load the journal of a batch directory.
    ///
    /// # Errors
    ///
    /// [`JournalError::NotFound`] when the file is missing,
    /// [`JournalError::Corrupt`] when it does not parse.
    pub fn load(batch_dir: &Path) -> Result<Self, JournalError> {
        let path = Self::path_in(batch_dir);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => JournalError::NotFound(path.clone()),
            _ => JournalError::Io {
                path: path.clone(),
                source: e,
            },
        })?;

        let records: Vec<FileRecord> =
            serde_json::from_str(&content).map_err(|source| JournalError::Corrupt {
                path: path.clone(),
                source,
            })?;

        log::debug!("Loaded {} journal records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    /// Write the whole journal in one step.
    ///
    /// The content goes to a temporary file in the batch directory which is
    /// then renamed over the journal, so readers see either the previous
    /// journal or the complete new one.
    ///
    /// # Errors
    ///
    /// [`JournalError::Io`] if the temporary file cannot be written or persisted.
    pub fn save(&self, batch_dir: &Path) -> Result<(), JournalError> {
        let path = Self::path_in(batch_dir);
        let io_err = |source: io::Error| JournalError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.records).map_err(|e| io_err(e.into()))?;

        let mut tmp = NamedTempFile::new_in(batch_dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        log::debug!("Wrote {} journal records to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Append records to an existing journal and write it back atomically.
    ///
    /// # Errors
    ///
    /// Any [`JournalError`] from loading or saving.
    pub fn append(batch_dir: &Path, new_records: Vec<FileRecord>) -> Result<Self, JournalError> {
        let mut journal = Self::load(batch_dir)?;
        journal.records.extend(new_records);
        journal.save(batch_dir)?;
        Ok(journal)
    }

    /// Records with the given action, in journal order.
    pub fn with_action(&self, action: RecordAction) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(move |r| r.action == action)
    }

    /// `moved` records that no later `restored` record has consumed.
    ///
    /// A `moved` record is consumed once a `restored` record with the same
    /// `moved_to` exists, which makes repeated restores of a batch no-ops.
    #[must_use]
    pub fn pending_restores(&self) -> Vec<&FileRecord> {
        let consumed: std::collections::HashSet<&Path> = self
            .with_action(RecordAction::Restored)
            .map(|r| r.moved_to.as_path())
            .collect();

        self.with_action(RecordAction::Moved)
            .filter(|r| !consumed.contains(r.moved_to.as_path()))
            .collect()
    }

    /// Number of records of each kind: `(moved, restored, failed)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        self.records
            .iter()
            .fold((0, 0, 0), |(m, r, f), rec| match rec.action {
                RecordAction::Moved => (m + 1, r, f),
                RecordAction::Restored => (m, r + 1, f),
                RecordAction::Failed => (m, r, f + 1),
            })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the journal has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
