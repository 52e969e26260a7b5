//! Error types for walstore
//!
//! Provides a unified error type for all WAL operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for walstore operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Segment Directory Errors
    // -------------------------------------------------------------------------
    #[error("Malformed segment file name: {name}")]
    MalformedSegmentName { name: String },

    // -------------------------------------------------------------------------
    // Record Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt WAL record: {0}")]
    CorruptRecord(String),

    /// A frame ends before its declared length (torn write at the tail)
    #[error("Truncated WAL record: {0}")]
    TruncatedRecord(String),

    #[error(
        "Checksum mismatch for record {sequence} in segment {segment} at offset {offset}: \
         expected {expected:#010x}, got {actual:#010x}"
    )]
    ChecksumMismatch {
        segment: u64,
        offset: u64,
        sequence: u64,
        expected: u32,
        actual: u32,
    },

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("WAL write failed: {0}")]
    Write(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WalError {
    /// Attach a segment/offset location to a codec-level error.
    ///
    /// Only `CorruptRecord` and `TruncatedRecord` carry a free-form message;
    /// every other variant is returned unchanged.
    pub fn at(self, segment: u64, offset: u64) -> Self {
        match self {
            WalError::CorruptRecord(reason) => WalError::CorruptRecord(format!(
                "segment {}, offset {}: {}",
                segment, offset, reason
            )),
            WalError::TruncatedRecord(reason) => WalError::TruncatedRecord(format!(
                "segment {}, offset {}: {}",
                segment, offset, reason
            )),
            other => other,
        }
    }

    /// True for integrity failures found while decoding (not I/O failures)
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalError::CorruptRecord(_) | WalError::ChecksumMismatch { .. }
        )
    }
}

impl From<bincode::Error> for WalError {
    fn from(e: bincode::Error) -> Self {
        WalError::Serialization(e.to_string())
    }
}
