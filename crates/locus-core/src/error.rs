//! Error types for Locus core operations.
//!
//! Library-level errors are modelled with `thiserror` so callers can tell a
//! failed directory walk apart from a misuse of the lifecycle. The CLI wraps
//! these in `anyhow` at its top level.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using LocusError
pub type Result<T> = std::result::Result<T, LocusError>;

/// Core error types for Locus operations.
#[derive(Error, Debug)]
pub enum LocusError {
    // === Root Errors ===
    /// The root directory does not exist
    #[error("root directory not found: {path}")]
    RootNotFound { path: PathBuf },

    /// The root exists but is not a directory
    #[error("root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    // === Pattern Errors ===
    /// The search pattern is not a valid glob
    #[error("invalid search pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Enumeration Errors ===
    /// A directory walk failed part way through
    #[error("failed to enumerate {path}: {source}")]
    Enumeration {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // === Watcher Errors ===
    /// The change-notification subscription could not be established
    #[error("watcher error: {reason}")]
    Watcher { reason: String },

    // === Lifecycle Errors ===
    /// An operation was attempted in a state that does not allow it
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LocusError {
    /// Returns true if this error came from walking the directory tree
    pub fn is_enumeration_failure(&self) -> bool {
        matches!(
            self,
            LocusError::Enumeration { .. }
                | LocusError::RootNotFound { .. }
                | LocusError::NotADirectory { .. }
        )
    }

    /// Returns true if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LocusError::Enumeration { .. }
                | LocusError::RootNotFound { .. }
                | LocusError::Watcher { .. }
                | LocusError::Io(_)
        )
    }

    /// Create an enumeration error for `path`
    pub fn enumeration(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LocusError::Enumeration {
            path: path.into(),
            source,
        }
    }

    /// Create a watcher error
    pub fn watcher(reason: impl Into<String>) -> Self {
        LocusError::Watcher {
            reason: reason.into(),
        }
    }
}

impl From<notify::Error> for LocusError {
    fn from(err: notify::Error) -> Self {
        LocusError::Watcher {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_classification() {
        let err = LocusError::enumeration(
            "/music/locked",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_enumeration_failure());
        assert!(err.is_recoverable());

        let err = LocusError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed bracket".to_string(),
        };
        assert!(!err.is_enumeration_failure());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = LocusError::InvalidState {
            operation: "init",
            state: "running".to_string(),
        };
        assert_eq!(err.to_string(), "cannot init while running");

        let err = LocusError::RootNotFound {
            path: PathBuf::from("/missing"),
        };
        assert_eq!(err.to_string(), "root directory not found: /missing");
    }
}
