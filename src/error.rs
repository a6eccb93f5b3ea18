//! Error types for dirsum
//!
//! Per-file failures are carried inside `HashResult` values and never abort a
//! run; the variants that escalate to the caller are cancellation, invalid
//! input, strict-mode unreadable directories and output write failures.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for dirsum operations
#[derive(Error, Debug)]
pub enum DigestError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Directory listing failed and the policy forbids skipping it
    #[error("Cannot list directory '{path}': {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The digest file could not be created or written
    #[error("Failed to write digest to '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A hashing worker panicked or was aborted
    #[error("Hashing task failed: {0}")]
    TaskJoin(String),

    /// Signal handlers for cancellation could not be installed
    #[error("Failed to install signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),

    /// Operation cancelled by user
    #[error("Operation cancelled")]
    Cancelled,
}

impl DigestError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error is a permission issue
    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => true,
            Self::Io { source, .. }
            | Self::UnreadableDirectory { source, .. }
            | Self::OutputWrite { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }

    /// Whether the run was stopped by a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::UnreadableDirectory { path, .. }
            | Self::OutputWrite { path, .. }
            | Self::NotFound(path)
            | Self::NotADirectory(path)
            | Self::PermissionDenied(path) => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for dirsum operations
pub type Result<T> = std::result::Result<T, DigestError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| DigestError::io(path, e))
    }
}
