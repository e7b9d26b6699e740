//! Exit codes and structured error reporting for the binary.

use serde::Serialize;

use crate::duplicates::ScoreError;
use crate::scanner::ScanError;
use crate::signal::EXIT_CODE_INTERRUPTED;

/// Exit codes for `foldupe`.
///
/// - 0: Success (completed normally, dupes found)
/// - 1: General error (unexpected failure)
/// - 2: No dupes found
/// - 3: Partial success (scan access errors, or the operator declined)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDupes = 2,
    PartialSuccess = 3,
    Interrupted = EXIT_CODE_INTERRUPTED as isize,
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
            Self::Success => "FD000",
            Self::GeneralError => "FD001",
            Self::NoDupes => "FD002",
            Self::PartialSuccess => "FD003",
            Self::Interrupted => "FD130",
        }
    }

    /// Exit code for a failed run.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if is_interrupted(err) {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Whether `err` was caused by a cancelled scan or scoring pass.
#[must_use]
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<ScanError>(), Some(ScanError::Cancelled))
            || matches!(
                cause.downcast_ref::<ScoreError>(),
                Some(ScoreError::Interrupted)
            )
    })
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "FD001")
    pub code: String,
    pub exit_code: i32,
    /// Human-readable message including every cause
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
