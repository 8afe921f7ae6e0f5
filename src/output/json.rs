//! JSON output for scripting and automation.
//!
//! Every command has one report type. All of them carry `exit_code` and
//! `exit_code_name` so a script can branch on the JSON alone.
//!
//! # Scan report schema
//!
//! ```json
//! {
//!   "dry_run": false,
//!   "batch": "/q/quarantine-20240501-120000",
//!   "moved": 1,
//!   "failed": 0,
//!   "records": [
//!     {
//!       "original": "/data/a.txt",
//!       "moved_to": "/q/quarantine-20240501-120000/a.txt",
//!       "size": 0,
//!       "time": "2024-05-01 12:00:00",
//!       "action": "moved"
//!     }
//!   ],
//!   "failures": [],
//!   "scan_errors": [],
//!   "interrupted": false,
//!   "exit_code": 0,
//!   "exit_code_name": "RQ000"
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::actions::MoveError;
use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;
use crate::journal::{data::TIME_FORMAT, FileRecord};
use crate::quarantine::{BatchSummary, QuarantineReport};
use crate::restore::RestoreReport;
use crate::scanner::ScanError;

/// Serialization helpers shared by every report.
pub trait JsonReport: Serialize {
    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Arguments
    ///
    /// * `writer` - The writer to output to (e.g., stdout)
    /// * `pretty` - Whether to pretty-print the output
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// A per-path failure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// Path the failure refers to
    pub path: String,
    /// Error message
    pub error: String,
}

impl JsonFailure {
    fn from_move_error(error: &MoveError) -> Self {
        Self {
            path: display_path(error.path()),
            error: error.to_string(),
        }
    }

    fn from_scan_error(error: &ScanError) -> Self {
        Self {
            path: display_path(error.path()),
            error: error.to_string(),
        }
    }
}

/// Outcome of `scan`, or of separating duplicates.
#[derive(Debug, Clone, Serialize)]
pub struct JsonQuarantineReport {
    /// Whether nothing was actually moved
    pub dry_run: bool,
    /// Batch directory (planned one for dry-run), absent when no batch was needed
    pub batch: Option<String>,
    /// Number of files moved (or that would be moved)
    pub moved: usize,
    /// Number of files that could not be moved
    pub failed: usize,
    /// Journal records, in order
    pub records: Vec<FileRecord>,
    /// Per-file failures
    pub failures: Vec<JsonFailure>,
    /// Directories or files the traversal could not read
    pub scan_errors: Vec<JsonFailure>,
    /// Whether shutdown was requested before the run completed
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "RQ000")
    pub exit_code_name: String,
}

impl JsonQuarantineReport {
    /// Create from a quarantine report and the exit code of the run.
    #[must_use]
    pub fn new(report: &QuarantineReport, exit_code: ExitCode) -> Self {
        Self {
            dry_run: report.dry_run,
            batch: report.batch_root.as_deref().map(display_path),
            moved: report.moved_count(),
            failed: report.failed_count(),
            records: report.records.clone(),
            failures: report.failures.iter().map(JsonFailure::from_move_error).collect(),
            scan_errors: report
                .scan_errors
                .iter()
                .map(JsonFailure::from_scan_error)
                .collect(),
            interrupted: report.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

impl JsonReport for JsonQuarantineReport {}

/// One file moved back out of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRestoredFile {
    /// Location inside the batch
    pub from: String,
    /// Recorded original path
    pub original: String,
    /// Where the file ended up
    pub restored_to: String,
}

/// A journal entry whose file was no longer in the batch.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSkippedFile {
    /// Location inside the batch
    pub from: String,
    /// Recorded original path
    pub original: String,
}

/// Outcome of `restore`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRestoreReport {
    /// Batch directory
    pub batch: String,
    /// Whether nothing was actually moved
    pub dry_run: bool,
    /// Restored files
    pub restored: Vec<JsonRestoredFile>,
    /// Skipped journal entries
    pub skipped: Vec<JsonSkippedFile>,
    /// Per-file failures
    pub failures: Vec<JsonFailure>,
    /// Entries already restored by an earlier run
    pub already_restored: usize,
    /// Whether shutdown was requested before the run completed
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "RQ000")
    pub exit_code_name: String,
}

impl JsonRestoreReport {
    /// Create from a restore report and the exit code of the run.
    #[must_use]
    pub fn new(report: &RestoreReport, exit_code: ExitCode) -> Self {
        Self {
            batch: display_path(&report.batch.root),
            dry_run: report.dry_run,
            restored: report
                .restored
                .iter()
                .map(|r| JsonRestoredFile {
                    from: display_path(&r.from),
                    original: display_path(&r.original),
                    restored_to: display_path(&r.restored_to),
                })
                .collect(),
            skipped: report
                .skipped
                .iter()
                .map(|s| JsonSkippedFile {
                    from: display_path(&s.from),
                    original: display_path(&s.original),
                })
                .collect(),
            failures: report.failures.iter().map(JsonFailure::from_move_error).collect(),
            already_restored: report.already_restored,
            interrupted: report.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

impl JsonReport for JsonRestoreReport {}

/// One batch in a listing.
#[derive(Debug, Clone, Serialize)]
pub struct JsonBatch {
    /// Directory name
    pub name: String,
    /// Absolute path
    pub path: String,
    /// Creation time encoded in the name
    pub created: String,
    /// Journal record count, `null` when the journal is unreadable
    pub records: Option<usize>,
}

/// Outcome of `list`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonBatchList {
    /// Quarantine base that was listed
    pub base: String,
    /// Batches, oldest first
    pub batches: Vec<JsonBatch>,
}

impl JsonBatchList {
    /// Create from batch summaries.
    #[must_use]
    pub fn new(base: &Path, summaries: &[BatchSummary]) -> Self {
        Self {
            base: display_path(base),
            batches: summaries
                .iter()
                .map(|s| JsonBatch {
                    name: s.batch.name(),
                    path: display_path(&s.batch.root),
                    created: s.batch.id.created.format(TIME_FORMAT).to_string(),
                    records: s.records,
                })
                .collect(),
        }
    }
}

impl JsonReport for JsonBatchList {}

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// BLAKE3 hash as hexadecimal string (64 characters)
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// The copy that stays in place
    pub original: String,
    /// The copies that would be separated
    pub duplicates: Vec<String>,
}

impl JsonDuplicateGroup {
    /// Create a JSON duplicate group from a DuplicateGroup.
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.hash_hex(),
            size: group.size,
            original: group
                .original()
                .map(|f| display_path(&f.path))
                .unwrap_or_default(),
            duplicates: group
                .duplicates()
                .iter()
                .map(|f| display_path(&f.path))
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Total number of files scanned
    pub total_files: usize,
    /// Total size of all scanned files in bytes
    pub total_size: u64,
    /// Files ruled out because their size was unique
    pub eliminated_by_size: usize,
    /// Files ruled out by the partial hash
    pub eliminated_by_prehash: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding originals)
    pub duplicate_files: usize,
    /// Space held by the duplicates (bytes)
    pub reclaimable_space: u64,
    /// Duration of the scan in milliseconds
    pub scan_duration_ms: u64,
    /// Files that could not be read or hashed
    pub scan_errors: Vec<JsonFailure>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "RQ000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from a ScanSummary and an exit code.
    #[must_use]
    pub fn from_scan_summary(summary: &ScanSummary, exit_code: ExitCode) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            eliminated_by_size: summary.eliminated_by_size,
            eliminated_by_prehash: summary.eliminated_by_prehash,
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            scan_duration_ms: summary.scan_duration.as_millis() as u64,
            scan_errors: summary
                .scan_errors
                .iter()
                .map(JsonFailure::from_scan_error)
                .collect(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// Outcome of `dupes`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicatesReport {
    /// Duplicate groups, ordered by where their original was found
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Scan summary statistics
    pub summary: JsonSummary,
    /// The separation batch, present when duplicates were moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separated: Option<JsonQuarantineReport>,
}

impl JsonDuplicatesReport {
    /// Create a JSON report from duplicate groups, summary and exit code.
    ///
    /// # Example
    ///
    /// ```
    /// use rustquarantine::duplicates::ScanSummary;
    /// use rustquarantine::error::ExitCode;
    /// use rustquarantine::output::json::{JsonDuplicatesReport, JsonReport};
    ///
    /// let output = JsonDuplicatesReport::new(&[], &ScanSummary::default(), None, ExitCode::NothingToDo);
    /// let json = output.to_json().unwrap();
    /// assert!(json.contains("\"exit_code_name\":\"RQ002\""));
    /// ```
    #[must_use]
    pub fn new(
        groups: &[DuplicateGroup],
        summary: &ScanSummary,
        separated: Option<&QuarantineReport>,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            duplicates: groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary::from_scan_summary(summary, exit_code),
            separated: separated.map(|r| JsonQuarantineReport::new(r, exit_code)),
        }
    }
}

impl JsonReport for JsonDuplicatesReport {}

/// Outcome of `scan`, with the duplicate pass when it is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct JsonScanReport {
    /// The empty-file quarantine
    #[serde(flatten)]
    pub quarantine: JsonQuarantineReport,
    /// The duplicate pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<JsonDuplicatesReport>,
}

impl JsonReport for JsonScanReport {}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
