//! Unified error type for the reclass library.
//!
//! Library code uses `ReclassError` while CLI code continues using
//! `anyhow::Result` for convenience.
//!
//! # Error Categories
//!
//! - **Io**: file system operations with path context
//! - **Parse**: malformed archive or tree input, with line context
//! - **Validation**: invalid parameters or data
//! - **Archive**: connector failures during streaming or commit
//! - **Cancelled**: cooperative user cancellation before commit
//! - **Inconsistent**: commit-phase failure that may leave the archive in
//!   an undefined state

use std::fmt;
use std::path::PathBuf;

/// Unified error type for the reclass library.
#[derive(Debug)]
pub enum ReclassError {
    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
    },

    /// Malformed input line (archive table, classification tree).
    Parse {
        path: PathBuf,
        line: u64,
        detail: String,
    },

    /// Validation error (invalid parameters, data invariants).
    Validation(String),

    /// Archive connector failure outside the commit phase.
    Archive(String),

    /// The user cancelled the analysis before the commit phase; the
    /// archive has not been touched.
    Cancelled,

    /// A failure inside `update_classifications`; the archive may be in
    /// an inconsistent state and the caller decides recovery.
    Inconsistent { context: String },
}

impl fmt::Display for ReclassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReclassError::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            ReclassError::Parse { path, line, detail } => {
                write!(f, "{}:{}: {}", path.display(), line, detail)
            }
            ReclassError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ReclassError::Archive(msg) => write!(f, "Archive error: {}", msg),
            ReclassError::Cancelled => write!(f, "Analysis cancelled by user"),
            ReclassError::Inconsistent { context } => write!(
                f,
                "Commit failed ({}); the archive may be inconsistent",
                context
            ),
        }
    }
}

impl std::error::Error for ReclassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReclassError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReclassError {
    fn from(err: std::io::Error) -> Self {
        ReclassError::Io {
            path: PathBuf::new(),
            operation: "unknown",
            source: err,
        }
    }
}

/// Convenience type alias for Results using ReclassError.
pub type Result<T> = std::result::Result<T, ReclassError>;

impl ReclassError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        ReclassError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a parse error with file and line context.
    pub fn parse(path: impl Into<PathBuf>, line: u64, detail: impl Into<String>) -> Self {
        ReclassError::Parse {
            path: path.into(),
            line,
            detail: detail.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        ReclassError::Validation(msg.into())
    }

    /// Create an archive error.
    pub fn archive(msg: impl Into<String>) -> Self {
        ReclassError::Archive(msg.into())
    }

    /// Create a commit-phase inconsistency error.
    pub fn inconsistent(context: impl Into<String>) -> Self {
        ReclassError::Inconsistent {
            context: context.into(),
        }
    }

    /// True for the cooperative-cancel signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReclassError::Cancelled)
    }
}
