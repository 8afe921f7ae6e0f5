//! Duplicate finder implementation with multi-phase detection.
//!
//! # Overview
//!
//! This module orchestrates the duplicate detection pipeline:
//! 1. **Phase 1 - Size grouping**: Group files by size (see [`crate::duplicates::groups`] module)
//! 2. **Phase 2 - Prehash**: Hash first 4KB of same-size files
//! 3. **Phase 3 - Full hash**: Hash entire content of prehash matches
//!
//! Every phase is sequential and order-preserving: groups come out ordered by
//! the traversal position of their original, and members keep traversal
//! order.
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default().with_min_size(1024));
//! let (groups, summary) = finder.find_duplicates(Path::new("/data")).unwrap();
//!
//! println!("Found {} duplicate groups", summary.duplicate_groups);
//! println!("Reclaimable space: {}", summary.reclaimable_display());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;

use super::groups::{group_by_size, DuplicateGroup, SizeGroup};
use crate::progress::ProgressCallback;
use crate::quarantine::{QuarantineError, QuarantineManager, QuarantineReport};
use crate::scanner::{
    FileEntry, Hash, HashError, Hasher, MinSize, ScanError, Walker, WalkerConfig, PREHASH_SIZE,
};

/// Configuration for the duplicate finder.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Smallest file size considered. `0` includes empty files.
    pub min_size: u64,
    /// Traversal settings.
    pub walker_config: WalkerConfig,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("min_size", &self.min_size)
            .field("walker_config", &self.walker_config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl FinderConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the shutdown flag.
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
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Default)]
pub struct ScanSummary {
    /// Total number of files scanned
    pub total_files: usize,
    /// Total size of all scanned files in bytes
    pub total_size: u64,
    /// Number of files eliminated by size grouping (unique sizes)
    pub eliminated_by_size: usize,
    /// Number of files eliminated by prehash (different first 4KB)
    pub eliminated_by_prehash: usize,
    /// Number of confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding originals)
    pub duplicate_files: usize,
    /// Total space that can be reclaimed by removing duplicates
    pub reclaimable_space: u64,
    /// Duration of the entire scan
    pub scan_duration: Duration,
    /// Traversal and hashing errors; the affected files were skipped
    pub scan_errors: Vec<ScanError>,
}

impl ScanSummary {
    /// Calculate the percentage of space that is wasted by duplicates.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_space).to_string()
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        ByteSize(self.total_size).to_string()
    }
}

/// Errors that can occur during duplicate finding.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The scan root is unusable.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Moving duplicates failed as a whole.
    #[error(transparent)]
    Quarantine(#[from] QuarantineError),
}

/// Duplicate finder that orchestrates the multi-phase detection pipeline.
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new();
        if let Some(ref flag) = config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(flag.clone());
        }
        Self { config, hasher }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Walk `path` and find every duplicate group among files of at least
    /// `min_size` bytes.
    ///
    /// # Errors
    ///
    /// [`FinderError::Scan`] for an unusable root, [`FinderError::Interrupted`]
    /// when shutdown is requested.
    pub fn find_duplicates(
        &self,
        path: &Path,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();

        let mut walker = Walker::new(
            path,
            self.config.walker_config.clone(),
            MinSize(self.config.min_size),
        );
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }
        walker.validate_root()?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("walking", 0);
        }
        let mut files = Vec::new();
        let mut walk_errors = Vec::new();
        for (idx, result) in walker.walk().enumerate() {
            match result {
                Ok(file) => {
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(idx + 1, file.path.to_string_lossy().as_ref());
                    }
                    files.push(file);
                }
                Err(e) => {
                    log::warn!("{}", e);
                    walk_errors.push(e);
                }
            }
        }
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("walking");
        }
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        let (groups, mut summary) = self.find_duplicates_from_files(files)?;
        walk_errors.append(&mut summary.scan_errors);
        summary.scan_errors = walk_errors;
        summary.scan_duration = start_time.elapsed();
        Ok((groups, summary))
    }

    /// Run phases 1 to 3 over an already collected file list.
    ///
    /// The list order is the traversal order used to pick originals.
    ///
    /// # Errors
    ///
    /// [`FinderError::Interrupted`] when shutdown is requested.
    pub fn find_duplicates_from_files(
        &self,
        files: Vec<FileEntry>,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();
        let mut summary = ScanSummary::default();

        let positions: HashMap<PathBuf, usize> = files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.clone(), i))
            .collect();

        // Phase 1
        let (size_groups, size_stats) = group_by_size(files);
        summary.total_files = size_stats.total_files;
        summary.total_size = size_stats.total_size;
        summary.eliminated_by_size = size_stats.eliminated_unique;

        // Phase 2
        let candidates: usize = size_groups.iter().map(SizeGroup::len).sum();
        let prehash_groups = self.phase2_prehash(size_groups, &mut summary)?;
        let survivors: usize = prehash_groups.iter().map(|(_, g)| g.len()).sum();
        summary.eliminated_by_prehash = candidates.saturating_sub(survivors);
        log::info!(
            "Prehash: {} of {} candidates remain",
            survivors,
            candidates
        );

        // Phase 3
        let mut groups = self.phase3_fullhash(prehash_groups, &mut summary)?;

        let position = |f: &FileEntry| positions.get(&f.path).copied().unwrap_or(usize::MAX);
        for group in &mut groups {
            group.members.sort_by_key(|f| position(f));
        }
        groups.sort_by_key(|g| g.original().map_or(usize::MAX, |f| position(f)));

        summary.duplicate_groups = groups.len();
        summary.duplicate_files = groups.iter().map(|g| g.duplicates().len()).sum();
        summary.reclaimable_space = groups.iter().map(DuplicateGroup::wasted_space).sum();
        summary.scan_duration = start_time.elapsed();

        log::info!(
            "Found {} duplicate group(s), {} duplicate file(s), {} reclaimable",
            summary.duplicate_groups,
            summary.duplicate_files,
            summary.reclaimable_display()
        );
        Ok((groups, summary))
    }

    /// Hash every file of a size group with `hash`, keep hashes shared by 2+ files.
    ///
    /// Returns `(size, members)` buckets in first-seen order.
    fn split_by_hash(
        &self,
        size: u64,
        files: Vec<FileEntry>,
        hash: impl Fn(&Hasher, &Path) -> Result<Hash, HashError>,
        summary: &mut ScanSummary,
    ) -> Result<Vec<(Hash, SizeGroup)>, FinderError> {
        let mut index: HashMap<Hash, usize> = HashMap::new();
        let mut buckets: Vec<(Hash, SizeGroup)> = Vec::new();

        for file in files {
            if self.config.is_shutdown_requested() {
                return Err(FinderError::Interrupted);
            }
            let digest = match hash(&self.hasher, &file.path) {
                Ok(digest) => digest,
                Err(HashError::Interrupted(_)) => return Err(FinderError::Interrupted),
                Err(e) => {
                    log::warn!("Skipping {}: {}", file.path.display(), e);
                    summary.scan_errors.push(ScanError::Hash(e));
                    continue;
                }
            };
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_item_completed(file.size);
            }
            let slot = *index.entry(digest).or_insert_with(|| {
                buckets.push((digest, SizeGroup::new(size)));
                buckets.len() - 1
            });
            buckets[slot].1.add(file);
        }

        Ok(buckets
            .into_iter()
            .filter(|(_, group)| group.has_duplicates())
            .collect())
    }

    fn phase2_prehash(
        &self,
        size_groups: Vec<SizeGroup>,
        summary: &mut ScanSummary,
    ) -> Result<Vec<(Hash, SizeGroup)>, FinderError> {
        let total: usize = size_groups.iter().map(SizeGroup::len).sum();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("prehash", total);
        }

        let mut done = 0;
        let mut out = Vec::new();
        for group in size_groups {
            done += group.len();
            let size = group.size;
            out.extend(self.split_by_hash(size, group.files, Hasher::prehash, summary)?);
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(done, &format!("{} byte files", size));
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("prehash");
        }
        Ok(out)
    }

    fn phase3_fullhash(
        &self,
        prehash_groups: Vec<(Hash, SizeGroup)>,
        summary: &mut ScanSummary,
    ) -> Result<Vec<DuplicateGroup>, FinderError> {
        let total: usize = prehash_groups.iter().map(|(_, g)| g.len()).sum();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("fullhash", total);
        }

        let mut done = 0;
        let mut out = Vec::new();
        for (prehash, group) in prehash_groups {
            done += group.len();
            let size = group.size;

            // The prehash already covers the whole content of small files.
            if size <= PREHASH_SIZE as u64 {
                out.push(DuplicateGroup::new(prehash, size, group.files));
                continue;
            }

            for (fingerprint, confirmed) in
                self.split_by_hash(size, group.files, Hasher::full_hash, summary)?
            {
                out.push(DuplicateGroup::new(fingerprint, size, confirmed.files));
            }
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(done, &format!("{} byte files", size));
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("fullhash");
        }
        Ok(out)
    }
}

/// Move every non-original member of `groups` into a batch of `manager`.
///
/// The manager's base acts as the duplicates directory, so the batch is
/// journaled and restorable like any quarantine batch. With a dry-run manager
/// only the plan is reported.
///
/// # Errors
///
/// Batch-level failures from [`QuarantineManager::run`].
pub fn relocate_duplicates(
    groups: &[DuplicateGroup],
    scan_root: &Path,
    manager: &QuarantineManager,
) -> Result<QuarantineReport, QuarantineError> {
    let duplicates: Vec<FileEntry> = groups
        .iter()
        .flat_map(|g| g.duplicates().iter().cloned())
        .collect();
    log::info!("Separating {} duplicate file(s)", duplicates.len());
    manager.run(scan_root, duplicates)
}
