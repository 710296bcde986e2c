//! Error types for the Alembic storage core.

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of an [`Error`], so callers can tell corrupt data apart
/// from misuse of the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The container could not be opened at all.
    Open,
    /// A structural rule of the object/property graph was broken.
    Structural,
    /// Stored bytes disagree with their own description or hash.
    Integrity,
    /// The underlying medium failed or ended early.
    Io,
    /// The caller used the API incorrectly.
    Usage,
}

/// Main error type.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Magic bytes at the start of the container are wrong
    #[error("Invalid container: expected Ogawa magic bytes")]
    InvalidContainer,

    /// Container version is newer than this reader understands
    #[error("Unsupported container version: {0}")]
    VersionUnsupported(u16),

    /// Frozen flag is unset, the writer never finished
    #[error("Container is not frozen (incomplete write)")]
    NotFrozen,

    /// Duplicate stream headers disagree
    #[error("Inconsistent streams: slot {slot} header differs from slot 0")]
    InconsistentStreams { slot: usize },

    /// File is truncated or a read came back short
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// A sibling with the same name was already created
    #[error("Duplicate name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Time sampling index is not in the archive table
    #[error("Time sampling {index} not found (table size: {count})")]
    TimeSamplingNotFound { index: u32, count: usize },

    /// Acyclic time sampling defines fewer times than samples
    #[error("Time sampling mismatch on '{property}': {samples} samples but only {times} times")]
    TimeSamplingMismatch {
        property: String,
        samples: usize,
        times: usize,
    },

    /// Time sampling parameters are unusable
    #[error("Invalid time sampling: {0}")]
    InvalidTimeSampling(String),

    /// Stored byte length does not match data type and dimensions
    #[error("Sample size mismatch: expected {expected} bytes, got {actual}")]
    SampleSizeMismatch { expected: usize, actual: usize },

    /// Recomputed hash differs from the stored one
    #[error("Hash mismatch in {0}")]
    HashMismatch(String),

    /// Type mismatch when reading or writing data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Parent was closed, no more children may be added
    #[error("'{0}' is closed")]
    Closed(String),

    /// Archive is frozen (finalized)
    #[error("Archive is frozen and cannot be modified")]
    Frozen,

    /// A node outlived the archive or parent it needs
    #[error("'{0}' is no longer reachable")]
    Expired(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        use ErrorCategory::*;
        match self {
            Self::InvalidContainer
            | Self::VersionUnsupported(_)
            | Self::NotFrozen
            | Self::InconsistentStreams { .. } => Open,
            Self::DuplicateName { .. }
            | Self::SampleOutOfBounds { .. }
            | Self::ChildOutOfBounds { .. }
            | Self::TimeSamplingNotFound { .. }
            | Self::TimeSamplingMismatch { .. }
            | Self::Closed(_)
            | Self::Frozen => Structural,
            Self::InvalidStructure(_)
            | Self::SampleSizeMismatch { .. }
            | Self::HashMismatch(_)
            | Self::Utf8(_) => Integrity,
            Self::FileNotFound(_) | Self::UnexpectedEof(_) | Self::MmapFailed(_) | Self::Io(_) => Io,
            Self::TypeMismatch { .. }
            | Self::InvalidTimeSampling(_)
            | Self::Expired(_)
            | Self::Other(_) => Usage,
        }
    }

    /// True for conditions caused by bad stored data rather than the caller.
    pub fn is_corruption(&self) -> bool {
        matches!(self.category(), ErrorCategory::Integrity | ErrorCategory::Open)
    }
}

/// Result type alias for Alembic operations.
pub type Result<T> = std::result::Result<T, Error>;
