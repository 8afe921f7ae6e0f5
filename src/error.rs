//! Structured error handling and exit codes.

use serde::Serialize;

use crate::duplicates::FinderError;

/// Exit codes for the RustQuarantine application.
///
/// - 0: Success (every selected file was handled)
/// - 1: General error (unexpected failure)
/// - 2: Nothing to do (no candidates, or the batch was already restored)
/// - 3: Partial success (some files or directories failed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: every selected file was handled.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Nothing to do: no candidates were found.
    NothingToDo = 2,
    /// Partial success: completed with per-file or traversal errors.
    PartialSuccess = 3,
    /// Interrupted: the run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RQ000",
            Self::GeneralError => "RQ001",
            Self::NothingToDo => "RQ002",
            Self::PartialSuccess => "RQ003",
            Self::Interrupted => "RQ130",
        }
    }

    /// Exit code for a finished run.
    ///
    /// Interruption wins over failures, failures over an empty run.
    #[must_use]
    pub fn from_outcome(interrupted: bool, all_succeeded: bool, nothing_done: bool) -> Self {
        if interrupted {
            Self::Interrupted
        } else if !all_succeeded {
            Self::PartialSuccess
        } else if nothing_done {
            Self::NothingToDo
        } else {
            Self::Success
        }
    }

    /// Exit code for an error that aborted the run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        let interrupted = err
            .downcast_ref::<FinderError>()
            .is_some_and(|e| matches!(e, FinderError::Interrupted));
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "RQ001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
