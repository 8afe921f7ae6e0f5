//! Human-readable reports.
//!
//! Colors come from yansi and are switched off globally with
//! [`yansi::disable`] when `--no-color` or `NO_COLOR` is set; the writers
//! here never decide on color themselves.

use std::io::{self, Write};
use std::path::Path;

use bytesize::ByteSize;
use yansi::Paint;

use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::journal::{RecordAction, TIME_FORMAT};
use crate::quarantine::{BatchSummary, PlannedMove, QuarantinePlan, QuarantineReport};
use crate::restore::RestoreReport;

/// Number of hex digits shown for a group fingerprint.
const SHORT_HASH_LEN: usize = 12;

/// Write the moves a plan would make, for confirmation.
///
/// # Errors
///
/// I/O errors from `w`.
pub fn write_plan<W: Write>(w: &mut W, plan: &QuarantinePlan) -> io::Result<()> {
    let root = plan.batch_root();
    for step in &plan.moves {
        match step {
            PlannedMove::Relocate {
                source, relative, ..
            } => writeln!(
                w,
                "  {} -> {}",
                source.display(),
                root.join(relative).display()
            )?,
            PlannedMove::Rejected { source, error, .. } => writeln!(
                w,
                "  {} {}: {}",
                "cannot move".red(),
                source.display(),
                error
            )?,
        }
    }
    writeln!(
        w,
        "{}",
        format!(
            "{} file(s) will be moved into {}",
            plan.moves.len(),
            root.display()
        )
        .bold()
    )
}

/// Write the outcome of a quarantine run.
///
/// # Errors
///
/// I/O errors from `w`.
pub fn write_quarantine_report<W: Write>(w: &mut W, report: &QuarantineReport) -> io::Result<()> {
    let verb = if report.dry_run { "would move" } else { "moved" };
    for record in &report.records {
        match record.action {
            RecordAction::Moved => writeln!(
                w,
                "  {} {} -> {}",
                verb.green(),
                record.original.display(),
                record.moved_to.display()
            )?,
            RecordAction::Failed => writeln!(
                w,
                "  {} {}: {}",
                "failed".red().bold(),
                record.original.display(),
                record.error.as_deref().unwrap_or("unknown error")
            )?,
            RecordAction::Restored => {}
        }
    }
    for error in &report.scan_errors {
        writeln!(w, "  {} {}", "warning:".yellow(), error)?;
    }
    if report.records.is_empty() && report.batch_root.is_none() {
        writeln!(w, "{}", "No empty files found".dim())?;
        return Ok(());
    }
    writeln!(w, "{}", report.summary().bold())
}

/// Write the outcome of a restore.
///
/// # Errors
///
/// I/O errors from `w`.
pub fn write_restore_report<W: Write>(w: &mut W, report: &RestoreReport) -> io::Result<()> {
    let verb = if report.dry_run {
        "would restore"
    } else {
        "restored"
    };
    for file in &report.restored {
        if file.deviated() {
            writeln!(
                w,
                "  {} {} -> {} ({} is occupied)",
                verb.yellow(),
                file.from.display(),
                file.restored_to.display(),
                file.original.display()
            )?;
        } else {
            writeln!(
                w,
                "  {} {} -> {}",
                verb.green(),
                file.from.display(),
                file.restored_to.display()
            )?;
        }
    }
    for file in &report.skipped {
        writeln!(
            w,
            "  {} {} (no longer in the batch)",
            "skipped".yellow(),
            file.from.display()
        )?;
    }
    for error in &report.failures {
        writeln!(w, "  {} {}", "failed".red().bold(), error)?;
    }
    if report.is_noop() {
        writeln!(
            w,
            "{}",
            format!("Nothing to restore in {}", report.batch.name()).dim()
        )?;
        return Ok(());
    }
    writeln!(w, "{}", report.summary().bold())
}

/// Write a batch listing.
///
/// # Errors
///
/// I/O errors from `w`.
pub fn write_batch_list<W: Write>(w: &mut W, base: &Path, batches: &[BatchSummary]) -> io::Result<()> {
    if batches.is_empty() {
        writeln!(w, "No quarantine batches in {}", base.display())?;
        return Ok(());
    }
    writeln!(w, "{}", format!("Batches in {}:", base.display()).bold())?;
    for summary in batches {
        let records = summary
            .records
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        writeln!(
            w,
            "  {}  {}  {} record(s)",
            summary.batch.name().cyan(),
            summary.batch.id.created.format(TIME_FORMAT).dim(),
            records
        )?;
    }
    Ok(())
}

/// Write duplicate groups and the scan summary.
///
/// # Errors
///
/// I/O errors from `w`.
pub fn write_duplicates<W: Write>(
    w: &mut W,
    groups: &[DuplicateGroup],
    summary: &ScanSummary,
) -> io::Result<()> {
    for (idx, group) in groups.iter().enumerate() {
        let hash = group.hash_hex();
        writeln!(
            w,
            "{} {} x {} [{}]",
            format!("Group {}:", idx + 1).bold(),
            group.len(),
            ByteSize::b(group.size),
            hash[..SHORT_HASH_LEN].dim()
        )?;
        if let Some(original) = group.original() {
            writeln!(w, "  {} {}", "keep".green(), original.path.display())?;
        }
        for dup in group.duplicates() {
            writeln!(w, "  {} {}", "dupe".yellow(), dup.path.display())?;
        }
    }
    for error in &summary.scan_errors {
        writeln!(w, "  {} {}", "warning:".yellow(), error)?;
    }

    if groups.is_empty() {
        writeln!(
            w,
            "{}",
            format!(
                "No duplicates among {} file(s) ({})",
                summary.total_files,
                summary.total_size_display()
            )
            .dim()
        )?;
        return Ok(());
    }
    writeln!(
        w,
        "{}",
        format!(
            "{} group(s), {} duplicate file(s), {} reclaimable ({:.1}% of {}) in {:.2}s",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display(),
            summary.wasted_percentage(),
            summary.total_size_display(),
            summary.scan_duration.as_secs_f64()
        )
        .bold()
    )
}
