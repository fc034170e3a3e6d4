//! Error types for store backends.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::Store`] backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access for a file-backed store failed.
    #[error("store io failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Backing file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The persisted document could not be encoded or decoded.
    #[error("store document could not be serialized")]
    Serialize {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// The backend rejected the request (quota, permissions, missing host API).
    #[error("store backend rejected the request")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Backend supplied detail.
        message: String,
    },
}

impl StoreError {
    /// Operation that was being performed when the error occurred.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Io { operation, .. }
            | Self::Serialize { operation, .. }
            | Self::Backend { operation, .. } => operation,
        }
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
