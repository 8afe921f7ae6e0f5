//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file grouping (Phase 1)
//! - Prehash comparison (Phase 2)
//! - Full hash comparison (Phase 3)
//! - Separating duplicates into a restorable batch

pub mod finder;
pub mod groups;

pub use finder::{relocate_duplicates, DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{group_by_size, DuplicateGroup, GroupingStats, SizeGroup};
