//! RustQuarantine - Reversible File Quarantine
//!
//! A cross-platform Rust CLI application that moves empty files (and,
//! optionally, duplicate content found with BLAKE3 hashing) into timestamped
//! batch directories. Every batch carries a `metadata.json` journal, so any
//! batch can be restored to its original locations.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod journal;
pub mod logging;
pub mod output;
pub mod progress;
pub mod quarantine;
pub mod restore;
pub mod scanner;
pub mod scheduler;
pub mod signal;

pub use app::run_app;
