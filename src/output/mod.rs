//! Output formatters for command reports.
//!
//! This module provides two output formats:
//! - [`text`]: colored human-readable reports
//! - [`json`]: machine-readable reports for scripting
//!
//! # Example
//!
//! ```no_run
//! use rustquarantine::error::ExitCode;
//! use rustquarantine::output::json::{JsonQuarantineReport, JsonReport};
//! use rustquarantine::quarantine::{QuarantineConfig, QuarantineManager};
//! use rustquarantine::scanner::WalkerConfig;
//! use std::path::Path;
//!
//! let manager = QuarantineManager::new(QuarantineConfig::new("/q").with_dry_run(true));
//! let report = manager
//!     .quarantine_empty_files(Path::new("."), WalkerConfig::default())
//!     .unwrap();
//!
//! let output = JsonQuarantineReport::new(&report, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

// Re-export main types
pub use json::{
    JsonBatchList, JsonDuplicatesReport, JsonOutputError, JsonQuarantineReport, JsonReport,
    JsonRestoreReport, JsonScanReport,
};
