//! Result and error types for Cubrir.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Cubrir operations
pub type CubrirResult<T> = Result<T, CubrirError>;

/// Errors that can occur while aggregating coverage
#[derive(Debug, Error)]
pub enum CubrirError {
    /// One worker's raw profile could not be decoded
    #[error("malformed profile for {package} at line {line}: {reason}")]
    MalformedProfile {
        /// Package the worker was measuring
        package: String,
        /// 1-based line number in the raw profile text
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Same block key carries different statement counts across profiles
    #[error("inconsistent definition for block {block}: {left_statements} vs {right_statements} statements (profiles from different builds must not be merged)")]
    InconsistentBlockDefinition {
        /// The block key, rendered as `file:sl.sc,el.ec`
        block: String,
        /// Statement count already recorded for the block
        left_statements: u32,
        /// Conflicting statement count from the incoming profile
        right_statements: u32,
    },

    /// Cover mode header disagrees between contributing profiles
    #[error("cover mode mismatch: {left} vs {right} (profiles from different builds must not be merged)")]
    ModeMismatch {
        /// Mode already established for the merge
        left: String,
        /// Conflicting mode from the incoming profile
        right: String,
    },

    /// Every worker output was empty or unusable
    #[error("no usable coverage profiles produced for {package}")]
    NoProfilesProduced {
        /// Package (or scope) whose run yielded no data
        package: String,
    },

    /// Directory creation or write failure while placing output
    #[error("failed to place coverage output at {}: {message}", path.display())]
    OutputPlacement {
        /// Destination that could not be written
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CubrirError {
    /// Create a malformed-profile error
    #[must_use]
    pub fn malformed(
        package: impl Into<String>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedProfile {
            package: package.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create an output-placement error for a destination path
    #[must_use]
    pub fn placement(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::OutputPlacement {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error abandons the whole package aggregation
    /// (as opposed to excluding a single worker's contribution)
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedProfile { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_names_package_and_line() {
        let err = CubrirError::malformed("fixture", 3, "expected 3 fields, got 2");
        let msg = err.to_string();
        assert!(msg.contains("fixture"));
        assert!(msg.contains("line 3"));
        assert!(msg.contains("expected 3 fields"));
    }

    #[test]
    fn test_inconsistent_block_display() {
        let err = CubrirError::InconsistentBlockDefinition {
            block: "fixture/fixture.go:5.2,7.3".to_string(),
            left_statements: 2,
            right_statements: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("fixture/fixture.go:5.2,7.3"));
        assert!(msg.contains("2 vs 3"));
    }

    #[test]
    fn test_only_malformed_is_recoverable() {
        assert!(!CubrirError::malformed("p", 1, "bad").is_fatal());
        assert!(CubrirError::NoProfilesProduced {
            package: "p".to_string()
        }
        .is_fatal());
        assert!(CubrirError::ModeMismatch {
            left: "set".to_string(),
            right: "count".to_string()
        }
        .is_fatal());
        assert!(CubrirError::placement("/tmp/out", "denied").is_fatal());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CubrirError = io.into();
        assert!(err.to_string().contains("gone"));
    }
}
