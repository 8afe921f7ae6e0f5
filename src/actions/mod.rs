//! File actions module.
//!
//! This module provides the relocation primitives used by quarantine,
//! restore and duplicate separation:
//! - Structure-preserving or flattened destination paths
//! - Collision disambiguation (`name_1.ext`, `name_2.ext`, ...)
//! - Moves that never overwrite, with a cross-device copy fallback
//!
//! ```no_run
//! use rustquarantine::actions::{destination_for, move_file};
//! use std::path::Path;
//!
//! let rel = destination_for(Path::new("/data/sub/a.txt"), Path::new("/data"), true);
//! move_file(Path::new("/data/sub/a.txt"), &Path::new("/q").join(rel)).unwrap();
//! ```

pub mod relocate;

// Re-export commonly used types
pub use relocate::{
    destination_for, move_file, numbered_sibling, path_occupied, unique_path, MoveError,
    MAX_DISAMBIGUATION_ATTEMPTS,
};
