//! Reversible quarantine of admitted files.
//!
//! Quarantine is a two-phase operation:
//!
//! 1. [`QuarantineManager::plan`] decides the batch name and every
//!    destination. It only reads the filesystem.
//! 2. [`QuarantineManager::execute`] creates the batch directory, performs the
//!    moves and writes the whole journal in one atomic step.
//!
//! Dry-run is "plan only": [`QuarantineManager::run`] returns the plan as a
//! report without calling `execute`.
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::quarantine::{QuarantineConfig, QuarantineManager};
//! use rustquarantine::scanner::WalkerConfig;
//! use std::path::Path;
//!
//! let manager = QuarantineManager::new(QuarantineConfig::new("/var/quarantine"));
//! let report = manager
//!     .quarantine_empty_files(Path::new("/data"), WalkerConfig::new(true, true))
//!     .unwrap();
//! println!("{}", report.summary());
//! ```

pub mod batch;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use batch::{
    latest_batch, list_batches, summarize_batches, Batch, BatchId, BatchSummary,
    InvalidBatchName, BATCH_PREFIX, MAX_BATCH_SEQUENCE,
};

use walkdir::WalkDir;

use crate::actions::{
    destination_for, move_file, path_occupied, unique_path, MoveError, MAX_DISAMBIGUATION_ATTEMPTS,
};
use crate::journal::{self, FileRecord, Journal, JournalError, JOURNAL_FILE_NAME};
use crate::progress::ProgressCallback;
use crate::scanner::{AdmissionPredicate, EmptyFile, FileEntry, ScanError, Walker, WalkerConfig};

/// Errors that abort a whole quarantine run.
#[derive(thiserror::Error, Debug)]
pub enum QuarantineError {
    /// The scan root could not be walked.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The quarantine base exists but is not a directory.
    #[error("quarantine base is not a directory: {0}")]
    BaseNotDirectory(PathBuf),

    /// The batch directory could not be created.
    #[error("failed to create batch directory {path}: {source}")]
    CreateBatch {
        /// Directory being created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Every collision suffix for this second is taken.
    #[error("no free batch name near {0}")]
    BatchNamesExhausted(PathBuf),

    /// The journal could not be written after files were moved.
    ///
    /// Moved files are put back where possible; `stranded` lists the ones
    /// still inside the batch.
    #[error(
        "failed to write journal of {batch}: {source} ({} file(s) left in the batch)",
        .stranded.len()
    )]
    JournalWrite {
        /// Batch directory
        batch: PathBuf,
        /// Every record the journal should have held
        records: Vec<FileRecord>,
        /// `moved` records whose file could not be put back
        stranded: Vec<FileRecord>,
        /// The journal error
        #[source]
        source: JournalError,
    },

    /// Listing existing batches failed.
    #[error("failed to read quarantine base {path}: {source}")]
    Io {
        /// Base directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for a quarantine run.
#[derive(Debug, Clone)]
pub struct QuarantineConfig {
    /// Directory under which batch directories are created.
    pub base: PathBuf,
    /// Mirror paths relative to the scan root instead of flattening.
    pub preserve_structure: bool,
    /// Plan only; touch neither files nor journal.
    pub dry_run: bool,
}

impl QuarantineConfig {
    /// Flattening, non-dry-run config for `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            preserve_structure: false,
            dry_run: false,
        }
    }

    /// Enable/disable structure preservation.
    #[must_use]
    pub fn with_preserve_structure(mut self, preserve: bool) -> Self {
        self.preserve_structure = preserve;
        self
    }

    /// Enable/disable dry-run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// One planned step.
#[derive(Debug)]
pub enum PlannedMove {
    /// Move `source` to `relative` under the batch root.
    Relocate {
        /// File to move
        source: PathBuf,
        /// Size at scan time
        size: u64,
        /// Destination relative to the batch root
        relative: PathBuf,
    },
    /// No destination could be found; recorded as `failed` on execution.
    Rejected {
        /// File that will not be moved
        source: PathBuf,
        /// Size at scan time
        size: u64,
        /// Why planning failed
        error: MoveError,
    },
}

impl PlannedMove {
    /// File this step is about.
    #[must_use]
    pub fn source(&self) -> &Path {
        match self {
            Self::Relocate { source, .. } | Self::Rejected { source, .. } => source,
        }
    }
}

/// Output of phase 1.
#[derive(Debug)]
pub struct QuarantinePlan {
    /// Canonical scan root used for structure preservation.
    pub scan_root: PathBuf,
    /// Absolute quarantine base.
    pub base: PathBuf,
    /// Batch name as of planning. [`QuarantineManager::execute`] names the
    /// batch again when it creates the directory.
    pub batch_id: BatchId,
    /// Steps in candidate order.
    pub moves: Vec<PlannedMove>,
}

impl QuarantinePlan {
    /// Intended batch directory.
    #[must_use]
    pub fn batch_root(&self) -> PathBuf {
        self.base.join(self.batch_id.to_string())
    }

    /// Whether there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The records this plan would produce, without touching anything.
    fn into_dry_run_report(self) -> QuarantineReport {
        let root = self.batch_root();
        let mut report = QuarantineReport::new(true);
        report.batch_root = (!self.moves.is_empty()).then(|| root.clone());
        for step in self.moves {
            match step {
                PlannedMove::Relocate {
                    source,
                    size,
                    relative,
                } => {
                    log::info!("[DRY-RUN] {} -> {}", source.display(), root.join(&relative).display());
                    report
                        .records
                        .push(FileRecord::moved(source, root.join(relative), size));
                }
                PlannedMove::Rejected {
                    source,
                    size,
                    error,
                } => {
                    log::warn!("[DRY-RUN] would fail {}: {}", source.display(), error);
                    report.records.push(FileRecord::failed(
                        source.clone(),
                        root.clone(),
                        size,
                        error.to_string(),
                    ));
                    report.failures.push(error);
                }
            }
        }
        report
    }
}

/// Files admitted by a walk, before planning.
#[derive(Debug)]
pub struct Candidates {
    /// Canonical scan root.
    pub root: PathBuf,
    /// Admitted files in traversal order.
    pub files: Vec<FileEntry>,
    /// Traversal errors; the affected entries were skipped.
    pub scan_errors: Vec<ScanError>,
}

/// Outcome of a quarantine run.
#[derive(Debug)]
pub struct QuarantineReport {
    /// Whether this was a dry-run.
    pub dry_run: bool,
    /// Batch directory (planned one for dry-run). `None` when there were no candidates.
    pub batch_root: Option<PathBuf>,
    /// Journal records in order; for dry-run, what would have been written.
    pub records: Vec<FileRecord>,
    /// Per-item failures.
    pub failures: Vec<MoveError>,
    /// Traversal errors encountered while collecting candidates.
    pub scan_errors: Vec<ScanError>,
    /// Shutdown was requested before every item was processed.
    pub interrupted: bool,
}

impl QuarantineReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            batch_root: None,
            records: Vec::new(),
            failures: Vec::new(),
            scan_errors: Vec::new(),
            interrupted: false,
        }
    }

    /// Number of `moved` records.
    #[must_use]
    pub fn moved_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action == journal::RecordAction::Moved)
            .count()
    }

    /// Number of per-item failures.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// No item failed and no traversal error occurred.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.scan_errors.is_empty() && !self.interrupted
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "Would move" } else { "Moved" };
        let location = self
            .batch_root
            .as_ref()
            .map_or_else(String::new, |p| format!(" into {}", p.display()));
        if self.all_succeeded() {
            format!("{verb} {} file(s){location}", self.moved_count())
        } else {
            format!(
                "{verb} {} file(s){location}, {} failed, {} scan error(s){}",
                self.moved_count(),
                self.failed_count(),
                self.scan_errors.len(),
                if self.interrupted { ", interrupted" } else { "" }
            )
        }
    }
}

/// Moves admitted files into a fresh batch and journals every move.
pub struct QuarantineManager {
    config: QuarantineConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl QuarantineManager {
    /// Create a manager.
    #[must_use]
    pub fn new(config: QuarantineConfig) -> Self {
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

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &QuarantineConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn absolute_base(&self) -> Result<PathBuf, QuarantineError> {
        let base = &self.config.base;
        if base.exists() && !base.is_dir() {
            return Err(QuarantineError::BaseNotDirectory(base.clone()));
        }
        Ok(std::fs::canonicalize(base)
            .or_else(|_| std::path::absolute(base))
            .unwrap_or_else(|_| base.clone()))
    }

    /// Directories a scan must not enter: existing batches under the base.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::Io`] when the base cannot be listed.
    pub fn exclusions(&self) -> Result<Vec<PathBuf>, QuarantineError> {
        let batches = list_batches(&self.config.base).map_err(|source| QuarantineError::Io {
            path: self.config.base.clone(),
            source,
        })?;
        Ok(batches.into_iter().map(|b| b.root).collect())
    }

    /// Phase 1: choose the batch name and every destination.
    ///
    /// Destinations are disambiguated against each other (`a.txt`,
    /// `a_1.txt`, ...) and never take the journal's name at the batch root,
    /// neither as a file nor as a directory.
    ///
    /// # Errors
    ///
    /// [`QuarantineError::BaseNotDirectory`] if the base is a file.
    pub fn plan(
        &self,
        scan_root: &Path,
        candidates: impl IntoIterator<Item = FileEntry>,
    ) -> Result<QuarantinePlan, QuarantineError> {
        let base = self.absolute_base()?;
        let scan_root = std::fs::canonicalize(scan_root).unwrap_or_else(|_| scan_root.to_path_buf());

        let wanted: Vec<(FileEntry, PathBuf)> = candidates
            .into_iter()
            .map(|entry| {
                let relative =
                    destination_for(&entry.path, &scan_root, self.config.preserve_structure);
                (entry, relative)
            })
            .collect();
        let wanted = reroute_journal_dir(wanted);

        // Directories the plan will create; no file may take their names.
        let dirs: HashSet<PathBuf> = wanted
            .iter()
            .filter_map(|(_, w)| w.as_ref().ok())
            .flat_map(|relative| relative.ancestors().skip(1))
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect();

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        claimed.insert(PathBuf::from(JOURNAL_FILE_NAME));

        let mut moves = Vec::new();
        for (entry, wanted) in wanted {
            let placed = wanted.and_then(|w| {
                unique_path(&w, |p| claimed.contains(p) || dirs.contains(p)).map(|r| (w, r))
            });
            match placed {
                Ok((wanted, relative)) => {
                    if relative != wanted {
                        log::debug!(
                            "Name collision in batch: {} -> {}",
                            wanted.display(),
                            relative.display()
                        );
                    }
                    claimed.insert(relative.clone());
                    moves.push(PlannedMove::Relocate {
                        source: entry.path,
                        size: entry.size,
                        relative,
                    });
                }
                Err(error) => {
                    log::warn!("Cannot place {}: {}", entry.path.display(), error);
                    moves.push(PlannedMove::Rejected {
                        source: entry.path,
                        size: entry.size,
                        error,
                    });
                }
            }
        }

        Ok(QuarantinePlan {
            scan_root,
            base,
            batch_id: BatchId::new(journal::now()),
            moves,
        })
    }

    /// Phase 2: create the batch, move every planned file and write the journal.
    ///
    /// An empty plan creates nothing. Per-item failures become `failed`
    /// records and do not stop the batch.
    ///
    /// # Errors
    ///
    /// Batch creation failures, or [`QuarantineError::JournalWrite`] after
    /// the moves were rolled back.
    pub fn execute(&self, plan: QuarantinePlan) -> Result<QuarantineReport, QuarantineError> {
        let mut report = QuarantineReport::new(false);
        if plan.is_empty() {
            log::info!("No files to quarantine; no batch created");
            return Ok(report);
        }

        let batch = Batch::create(&plan.base, BatchId::new(journal::now()))?;
        report.batch_root = Some(batch.root.clone());

        let total = plan.moves.len();
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("quarantine", total);
        }

        for (idx, step) in plan.moves.into_iter().enumerate() {
            if self.is_shutdown_requested() {
                log::info!("Quarantine interrupted after {} of {} files", idx, total);
                report.interrupted = true;
                break;
            }
            if let Some(ref callback) = self.progress_callback {
                callback.on_progress(idx + 1, step.source().to_string_lossy().as_ref());
            }

            match step {
                PlannedMove::Relocate {
                    source,
                    size,
                    relative,
                } => {
                    let wanted = batch.root.join(&relative);
                    let result =
                        unique_path(&wanted, path_occupied).and_then(|dest| {
                            move_file(&source, &dest).map(|moved_size| (dest, moved_size))
                        });
                    match result {
                        Ok((dest, moved_size)) => {
                            log::info!("[MOVED] {} -> {}", source.display(), dest.display());
                            report.records.push(FileRecord::moved(source, dest, moved_size));
                        }
                        Err(error) => {
                            log::error!("[FAILED] {}: {}", source.display(), error);
                            report.records.push(FileRecord::failed(
                                source,
                                wanted,
                                size,
                                error.to_string(),
                            ));
                            report.failures.push(error);
                        }
                    }
                }
                PlannedMove::Rejected {
                    source,
                    size,
                    error,
                } => {
                    report.records.push(FileRecord::failed(
                        source,
                        batch.root.clone(),
                        size,
                        error.to_string(),
                    ));
                    report.failures.push(error);
                }
            }
        }

        if let Err(source) = Journal::new(report.records.clone()).save(&batch.root) {
            log::error!("Cannot write journal of {}: {}", batch.root.display(), source);
            let stranded = roll_back(&batch.root, &report.records);
            return Err(QuarantineError::JournalWrite {
                batch: batch.root,
                records: report.records,
                stranded,
                source,
            });
        }

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("quarantine");
        }
        log::info!("{}", report.summary());
        Ok(report)
    }

    /// Plan, then execute unless this is a dry-run.
    ///
    /// # Errors
    ///
    /// See [`QuarantineManager::plan`] and [`QuarantineManager::execute`].
    pub fn run(
        &self,
        scan_root: &Path,
        candidates: impl IntoIterator<Item = FileEntry>,
    ) -> Result<QuarantineReport, QuarantineError> {
        let plan = self.plan(scan_root, candidates)?;
        if self.config.dry_run {
            let report = plan.into_dry_run_report();
            log::info!("{}", report.summary());
            Ok(report)
        } else {
            self.execute(plan)
        }
    }

    /// Walk `root` and collect what `predicate` admits.
    ///
    /// Existing batches under the base are excluded from the walk, so files
    /// already quarantined are never picked up again.
    ///
    /// # Errors
    ///
    /// An invalid root, or a base that cannot be listed.
    pub fn collect<P: AdmissionPredicate>(
        &self,
        root: &Path,
        walker_config: WalkerConfig,
        predicate: P,
    ) -> Result<Candidates, QuarantineError> {
        let mut walker_config = walker_config;
        walker_config.exclude_dirs.extend(self.exclusions()?);

        let mut walker = Walker::new(root, walker_config, predicate);
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }
        walker.validate_root()?;

        let mut candidates = Candidates {
            root: walker.root().to_path_buf(),
            files: Vec::new(),
            scan_errors: Vec::new(),
        };
        for result in walker.walk() {
            match result {
                Ok(entry) => candidates.files.push(entry),
                Err(e) => candidates.scan_errors.push(e),
            }
        }
        log::info!(
            "Found {} candidate(s) under {} ({} scan error(s))",
            candidates.files.len(),
            candidates.root.display(),
            candidates.scan_errors.len()
        );
        Ok(candidates)
    }

    /// Attach traversal errors and the interruption state to a finished run.
    #[must_use]
    pub fn finish(&self, mut report: QuarantineReport, scan_errors: Vec<ScanError>) -> QuarantineReport {
        report.scan_errors = scan_errors;
        if self.is_shutdown_requested() {
            report.interrupted = true;
        }
        report
    }

    /// Walk `root` with `predicate` and quarantine what it admits.
    ///
    /// # Errors
    ///
    /// See [`QuarantineManager::collect`] and [`QuarantineManager::run`].
    pub fn quarantine_matching<P: AdmissionPredicate>(
        &self,
        root: &Path,
        walker_config: WalkerConfig,
        predicate: P,
    ) -> Result<QuarantineReport, QuarantineError> {
        let candidates = self.collect(root, walker_config, predicate)?;
        let report = self.run(&candidates.root, candidates.files)?;
        Ok(self.finish(report, candidates.scan_errors))
    }

    /// Quarantine every empty file under `root`.
    ///
    /// # Errors
    ///
    /// See [`QuarantineManager::quarantine_matching`].
    pub fn quarantine_empty_files(
        &self,
        root: &Path,
        walker_config: WalkerConfig,
    ) -> Result<QuarantineReport, QuarantineError> {
        self.quarantine_matching(root, walker_config, EmptyFile)
    }
}

/// Move the top-level directory named like the journal to a free name.
///
/// Only structure-preserving plans can produce such paths. The new name
/// avoids every top-level name the plan uses.
fn reroute_journal_dir(
    wanted: Vec<(FileEntry, PathBuf)>,
) -> Vec<(FileEntry, Result<PathBuf, MoveError>)> {
    let under_journal_name = |relative: &Path| {
        let mut parts = relative.components();
        parts.next().is_some_and(|c| c.as_os_str() == JOURNAL_FILE_NAME) && parts.next().is_some()
    };
    if !wanted.iter().any(|(_, w)| under_journal_name(w.as_path())) {
        return wanted.into_iter().map(|(e, w)| (e, Ok(w))).collect();
    }

    let top_level: HashSet<PathBuf> = wanted
        .iter()
        .filter_map(|(_, w)| w.components().next())
        .map(|c| PathBuf::from(c.as_os_str()))
        .collect();
    let replacement = unique_path(Path::new(JOURNAL_FILE_NAME), |p| top_level.contains(p));
    if let Ok(ref dir) = replacement {
        log::debug!("Placing {}/ as {}/ in the batch", JOURNAL_FILE_NAME, dir.display());
    }

    wanted
        .into_iter()
        .map(|(entry, relative)| {
            if !under_journal_name(relative.as_path()) {
                return (entry, Ok(relative));
            }
            let rerouted = match replacement {
                Ok(ref dir) => relative
                    .strip_prefix(JOURNAL_FILE_NAME)
                    .map(|rest| dir.join(rest))
                    .map_err(|_| MoveError::DestinationExists(relative.clone())),
                Err(_) => Err(MoveError::CollisionExhausted {
                    path: relative.clone(),
                    attempts: MAX_DISAMBIGUATION_ATTEMPTS,
                }),
            };
            (entry, rerouted)
        })
        .collect()
}

/// Put every `moved` file of an unjournaled batch back where it came from.
///
/// Returns the records whose file is still in the batch. Directories left
/// empty are removed, including the batch directory itself.
fn roll_back(batch_root: &Path, records: &[FileRecord]) -> Vec<FileRecord> {
    let mut stranded = Vec::new();
    for record in records.iter().filter(|r| r.action == journal::RecordAction::Moved) {
        match move_file(&record.moved_to, &record.original) {
            Ok(_) => log::info!(
                "[ROLLED BACK] {} -> {}",
                record.moved_to.display(),
                record.original.display()
            ),
            Err(e) => {
                log::error!(
                    "[STRANDED] {} stays at {}: {}",
                    record.original.display(),
                    record.moved_to.display(),
                    e
                );
                stranded.push(record.clone());
            }
        }
    }

    for entry in WalkDir::new(batch_root)
        .contents_first(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
    {
        if std::fs::remove_dir(entry.path()).is_ok() {
            log::debug!("Removed empty directory {}", entry.path().display());
        }
    }
    stranded
}
