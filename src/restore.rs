//! Restoring quarantined files from a batch journal.
//!
//! A restore reads one batch's journal, moves every not-yet-restored file back
//! to its original path (or a disambiguated sibling when that path is
//! occupied) and appends one `restored` record per success.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::actions::{move_file, path_occupied, unique_path, MoveError};
use crate::journal::{FileRecord, Journal, JournalError};
use crate::progress::ProgressCallback;
use crate::quarantine::{latest_batch, Batch};

/// Errors that abort a restore.
#[derive(thiserror::Error, Debug)]
pub enum RestoreError {
    /// The base holds no batch directories.
    #[error("no quarantine batches found in {0}")]
    NoBatches(PathBuf),

    /// The requested batch does not exist or is not a batch directory.
    #[error("batch not found: {0}")]
    BatchNotFound(PathBuf),

    /// The batch journal is missing or corrupt.
    #[error(transparent)]
    Journal(#[from] JournalError),

    /// Files were moved back but the `restored` records could not be written.
    ///
    /// The moves are undone where possible; `stranded` lists the files that
    /// stay at their restored location without a record.
    #[error(
        "failed to record restores in {batch}: {source} ({} file(s) restored without a record)",
        .stranded.len()
    )]
    JournalWrite {
        /// Batch directory
        batch: PathBuf,
        /// Every restore the journal should have recorded
        restored: Vec<RestoredFile>,
        /// Restores that could not be undone
        stranded: Vec<RestoredFile>,
        /// The journal error
        #[source]
        source: JournalError,
    },

    /// Listing the base failed.
    #[error("failed to read quarantine base {path}: {source}")]
    Io {
        /// Base directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Which batch to restore.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchSelector {
    /// The most recently created batch under the base.
    #[default]
    Latest,
    /// A batch name (resolved against the base) or path.
    Explicit(PathBuf),
}

/// Configuration for a restore.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Quarantine base to look for batches in.
    pub base: PathBuf,
    /// Report what would be restored without moving anything.
    pub dry_run: bool,
}

impl RestoreConfig {
    /// Non-dry-run restore from `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            dry_run: false,
        }
    }

    /// Enable/disable dry-run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// A file moved (or, in dry-run, that would be moved) back out of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredFile {
    /// Location inside the batch.
    pub from: PathBuf,
    /// Recorded original path.
    pub original: PathBuf,
    /// Where the file ended up.
    pub restored_to: PathBuf,
}

impl RestoredFile {
    /// Whether the original path was occupied and a sibling name was used.
    #[must_use]
    pub fn deviated(&self) -> bool {
        self.restored_to != self.original
    }
}

/// A record whose quarantined file is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Location inside the batch that no longer exists.
    pub from: PathBuf,
    /// Recorded original path.
    pub original: PathBuf,
}

/// Outcome of a restore.
#[derive(Debug)]
pub struct RestoreReport {
    /// The batch that was restored.
    pub batch: Batch,
    /// Whether this was a dry-run.
    pub dry_run: bool,
    /// Successful (or simulated) restores, in journal order.
    pub restored: Vec<RestoredFile>,
    /// Records whose quarantined file is missing.
    pub skipped: Vec<SkippedFile>,
    /// Moves back that failed; they stay pending for a later run.
    pub failures: Vec<MoveError>,
    /// `moved` records already consumed by an earlier restore.
    pub already_restored: usize,
    /// Shutdown was requested before every record was processed.
    pub interrupted: bool,
}

impl RestoreReport {
    /// Whether the run had nothing to restore at all.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.restored.is_empty() && self.skipped.is_empty() && self.failures.is_empty()
    }

    /// Whether every pending record was restored.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty() && !self.interrupted
    }

    /// Human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "Would restore" } else { "Restored" };
        let deviated = self.restored.iter().filter(|r| r.deviated()).count();
        let mut out = format!(
            "{verb} {} file(s) from {}",
            self.restored.len(),
            self.batch.name()
        );
        if deviated > 0 {
            out.push_str(&format!(", {deviated} under a new name"));
        }
        if !self.skipped.is_empty() {
            out.push_str(&format!(", {} skipped", self.skipped.len()));
        }
        if !self.failures.is_empty() {
            out.push_str(&format!(", {} failed", self.failures.len()));
        }
        if self.already_restored > 0 {
            out.push_str(&format!(", {} already restored", self.already_restored));
        }
        out
    }
}

/// Moves files back out of a batch.
pub struct RestoreManager {
    config: RestoreConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl RestoreManager {
    /// Create a manager.
    #[must_use]
    pub fn new(config: RestoreConfig) -> Self {
        Self {
            config,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag checked before each file.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Resolve a selector to an existing batch.
    ///
    /// An explicit selector is tried as given, then as a name under the base.
    ///
    /// # Errors
    ///
    /// [`RestoreError::NoBatches`] or [`RestoreError::BatchNotFound`].
    pub fn resolve(&self, selector: &BatchSelector) -> Result<Batch, RestoreError> {
        match selector {
            BatchSelector::Latest => latest_batch(&self.config.base)
                .map_err(|source| RestoreError::Io {
                    path: self.config.base.clone(),
                    source,
                })?
                .ok_or_else(|| RestoreError::NoBatches(self.config.base.clone())),
            BatchSelector::Explicit(path) => Batch::open(path)
                .or_else(|| {
                    (!path.is_absolute())
                        .then(|| Batch::open(&self.config.base.join(path)))
                        .flatten()
                })
                .ok_or_else(|| RestoreError::BatchNotFound(path.clone())),
        }
    }

    /// Restore the selected batch.
    ///
    /// # Errors
    ///
    /// Batch resolution failures and journal errors. Per-file failures are
    /// reported in the [`RestoreReport`].
    pub fn restore(&self, selector: &BatchSelector) -> Result<RestoreReport, RestoreError> {
        let batch = self.resolve(selector)?;
        log::info!("Restoring batch {}", batch.root.display());

        let journal = batch.journal()?;
        let pending: Vec<FileRecord> = journal.pending_restores().into_iter().cloned().collect();
        let (moved, ..) = journal.counts();

        let mut report = RestoreReport {
            batch,
            dry_run: self.config.dry_run,
            restored: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            already_restored: moved - pending.len(),
            interrupted: false,
        };

        if pending.is_empty() {
            log::info!("Nothing to restore in {}", report.batch.name());
            return Ok(report);
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("restore", pending.len());
        }

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut new_records = Vec::new();

        for (idx, record) in pending.iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!("Restore interrupted after {} of {} files", idx, pending.len());
                report.interrupted = true;
                break;
            }
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(idx + 1, record.moved_to.to_string_lossy().as_ref());
            }

            if !path_occupied(&record.moved_to) {
                log::warn!(
                    "[SKIPPED] {} is no longer in the batch",
                    record.moved_to.display()
                );
                report.skipped.push(SkippedFile {
                    from: record.moved_to.clone(),
                    original: record.original.clone(),
                });
                continue;
            }

            let target = match restore_target(&record.original, &claimed) {
                Ok(target) => target,
                Err(e) => {
                    log::error!("[FAILED] {}: {}", record.original.display(), e);
                    report.failures.push(e);
                    continue;
                }
            };

            if self.config.dry_run {
                log::info!(
                    "[DRY-RUN] {} -> {}",
                    record.moved_to.display(),
                    target.display()
                );
            } else if let Err(e) = move_file(&record.moved_to, &target) {
                log::error!("[FAILED] {}: {}", record.moved_to.display(), e);
                report.failures.push(e);
                continue;
            } else {
                log::info!(
                    "[RESTORED] {} -> {}",
                    record.moved_to.display(),
                    target.display()
                );
                new_records.push(FileRecord::restored(record, &target));
            }

            if target != record.original {
                log::warn!(
                    "{} is occupied, restored as {}",
                    record.original.display(),
                    target.display()
                );
            }
            claimed.insert(target.clone());
            report.restored.push(RestoredFile {
                from: record.moved_to.clone(),
                original: record.original.clone(),
                restored_to: target,
            });
        }

        if !new_records.is_empty() {
            if let Err(source) = Journal::append(&report.batch.root, new_records) {
                log::error!(
                    "Cannot record restores in {}: {}",
                    report.batch.root.display(),
                    source
                );
                let stranded = undo_restores(&report.restored);
                return Err(RestoreError::JournalWrite {
                    batch: report.batch.root,
                    restored: report.restored,
                    stranded,
                    source,
                });
            }
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("restore");
        }
        log::info!("{}", report.summary());
        Ok(report)
    }
}

/// Move restored files back into their batch; returns the ones that stay out.
fn undo_restores(restored: &[RestoredFile]) -> Vec<RestoredFile> {
    restored
        .iter()
        .filter(|file| match move_file(&file.restored_to, &file.from) {
            Ok(_) => {
                log::info!(
                    "[ROLLED BACK] {} -> {}",
                    file.restored_to.display(),
                    file.from.display()
                );
                false
            }
            Err(e) => {
                log::error!(
                    "[STRANDED] {} has no restore record: {}",
                    file.restored_to.display(),
                    e
                );
                true
            }
        })
        .cloned()
        .collect()
}

/// `original` if free, otherwise its first sibling free on disk and in `claimed`.
///
/// # Errors
///
/// [`MoveError::CollisionExhausted`] when no sibling name is free.
pub fn restore_target(original: &Path, claimed: &HashSet<PathBuf>) -> Result<PathBuf, MoveError> {
    unique_path(original, |p| path_occupied(p) || claimed.contains(p))
}
