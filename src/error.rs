//! Error types for the treesync library
//!
//! This module defines all error types that can occur while reconciling a
//! directory tree. Errors fall in two groups:
//!
//! - **Configuration errors**: malformed glob patterns or an invalid expected
//!   tree. These are detected before the filesystem is touched.
//! - **I/O errors**: failures while listing, reading, writing or removing
//!   files. These abort the sync immediately; mutations already issued are
//!   not rolled back, so the prescribed recovery is to run the sync again.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the treesync library
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for all treesync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A glob pattern failed to compile
    #[error("Invalid glob pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Underlying parse error
        #[source]
        source: globset::Error,
    },

    /// No glob patterns were configured
    #[error("At least one glob pattern is required")]
    NoPatterns,

    /// A directory key of the expected tree is not a clean relative path
    #[error("Invalid directory {dir:?} in expected tree: {reason}")]
    InvalidDirectory {
        /// The directory key as given
        dir: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// A file name of the expected tree is not a bare file name
    #[error("Invalid file name {name:?} in directory {dir:?}: {reason}")]
    InvalidFileName {
        /// Directory the name was declared in
        dir: String,
        /// The file name as given
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// I/O failure on a specific path
    #[error("Failed to {op} {path:?}: {source}")]
    Io {
        /// Operation that failed (e.g. "read", "remove")
        op: &'static str,
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Directory discovery failed
    #[error("Walk directory error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Manifest is structurally valid JSON but semantically wrong
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// Manifest could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap an I/O error with the operation and path it happened on
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Create a manifest error with a custom message
    pub fn manifest(msg: impl Into<String>) -> Self {
        SyncError::Manifest(msg.into())
    }

    /// Check if this error was raised before any filesystem mutation
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidPattern { .. }
                | SyncError::NoPatterns
                | SyncError::InvalidDirectory { .. }
                | SyncError::InvalidFileName { .. }
                | SyncError::Manifest(_)
                | SyncError::Json(_)
        )
    }

    /// Check if this is an I/O error for a path that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if this error indicates the tree may be partially reconciled
    pub fn may_have_partially_applied(&self) -> bool {
        matches!(self, SyncError::Io { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            SyncError::InvalidPattern { pattern, .. } => {
                format!(
                    "Glob pattern {:?} is malformed. Patterns use shell syntax: '*', '?' and '[...]'; braces and commas match literally.",
                    pattern
                )
            }
            SyncError::Io { source, path, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                format!(
                    "Permission denied for {:?}. Check directory permissions, then run the sync again to converge.",
                    path
                )
            }
            SyncError::Io { .. } => {
                format!("{}. The tree may be partially updated; run the sync again to converge.", self)
            }
            _ => self.to_string(),
        }
    }
}
