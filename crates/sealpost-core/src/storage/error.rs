//! Storage error types.
//!
//! - `Io`: the backing store failed (quota, file system, database)
//! - `Corrupt`: a record exists but cannot be decoded

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error (file system, database, quota)
    #[error("I/O error: {0}")]
    Io(String),

    /// A stored record could not be decoded
    #[error("corrupt record {key}: {reason}")]
    Corrupt {
        /// Key of the offending record
        key: String,
        /// Why decoding failed
        reason: String,
    },
}

impl StorageError {
    /// Returns true if the error describes a damaged record rather than a
    /// failing backend.
    ///
    /// Readers treat corrupt records as absent; I/O errors are reported.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
