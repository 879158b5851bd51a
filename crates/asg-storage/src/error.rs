//! Storage error types for asg-storage.
//!
//! [`StorageError`] covers every failure of reading or writing graph files:
//! I/O, malformed bytes, header identity checks and core-level restore
//! failures.

use asg_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Restoring nodes or edges into the graph failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The file does not start with the expected magic bytes.
    #[error("bad magic: expected {expected:?}")]
    BadMagic { expected: &'static str },

    /// The header names a different schema or language.
    #[error("wrong file type: expected {what} '{expected}', found '{found}'")]
    WrongFileType {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// A required header property is absent.
    #[error("header field '{0}' is missing")]
    MissingHeaderField(&'static str),

    #[error("{what} mismatch: expected '{expected}', found '{found}'")]
    VersionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// Truncated or otherwise malformed content.
    #[error("corrupt file: {reason}")]
    Corrupt { reason: String },

    /// A filter file written for a graph with a different slot count.
    #[error("filter covers {found} slots, graph has {expected}")]
    FilterSizeMismatch { expected: u32, found: u32 },
}

impl StorageError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            reason: reason.into(),
        }
    }

    /// True for failures of the underlying file system rather than of the
    /// file contents.
    pub fn is_io(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}
