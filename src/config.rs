//! Configuration for walstore
//!
//! Centralized configuration with sensible defaults. Every tuning knob the
//! engine reads lives here, so several engines with different settings can
//! coexist in one process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, WalError};
use crate::wal::{FRAME_HEADER_SIZE, MAX_BODY_SIZE, RECORD_OVERHEAD};

/// Default file name prefix for segment files
pub const DEFAULT_SEGMENT_PREFIX: &str = "wal-segment-";

/// Main configuration for a WAL instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files of this log
    /// Internal structure:
    ///   {directory}/
    ///     ├── wal-segment-1.log
    ///     ├── wal-segment-2.log
    ///     └── ...
    pub directory: PathBuf,

    /// File name prefix for segment files (`<prefix><N>.log`)
    pub segment_prefix: String,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Size threshold that triggers rotation (in bytes)
    pub max_segment_size_bytes: u64,

    /// Maximum number of live segment files; oldest are deleted first
    pub max_segments: usize,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync the active segment on every sync (not just flush to the OS)
    pub force_sync: bool,

    /// Interval of the background sync task (milliseconds)
    pub sync_interval_ms: u32,

    // -------------------------------------------------------------------------
    // Integrity Configuration
    // -------------------------------------------------------------------------
    /// Which sequence-number bytes are folded into record checksums
    pub checksum_scheme: ChecksumScheme,
}

/// Checksum scheme for WAL records
///
/// Both schemes hash the payload first and then append bytes derived from
/// the sequence number. A log must be read with the scheme it was written
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumScheme {
    /// Fold only the low 8 bits of the sequence number.
    ///
    /// Two records whose sequence numbers differ by a multiple of 256 and
    /// carry the same payload get the same checksum.
    LowByteSequence,

    /// Fold all 8 little-endian bytes of the sequence number
    #[default]
    FullSequence,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./wal_data"),
            segment_prefix: DEFAULT_SEGMENT_PREFIX.to_string(),
            max_segment_size_bytes: 16 * 1024 * 1024, // 16 MB
            max_segments: 100,
            force_sync: true,
            sync_interval_ms: 200,
            checksum_scheme: ChecksumScheme::default(),
        }
    }
}

impl Config {
    /// Default config rooted at the given directory
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Background sync interval as a `Duration`
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sync_interval_ms))
    }

    /// Largest record body the engine can write with this config
    ///
    /// A frame never exceeds `max_segment_size_bytes`, so readers treat any
    /// longer length prefix as corruption rather than a torn write.
    pub fn max_body_len(&self) -> usize {
        let limit = self
            .max_segment_size_bytes
            .saturating_sub(FRAME_HEADER_SIZE as u64);
        usize::try_from(limit).map_or(MAX_BODY_SIZE, |limit| limit.min(MAX_BODY_SIZE))
    }

    /// Check that the configuration can drive an engine
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(WalError::InvalidConfig(
                "directory cannot be empty".to_string(),
            ));
        }
        let min_segment_size = (FRAME_HEADER_SIZE + RECORD_OVERHEAD) as u64;
        if self.max_segment_size_bytes < min_segment_size {
            return Err(WalError::InvalidConfig(format!(
                "max_segment_size_bytes must be at least {} (one empty record)",
                min_segment_size
            )));
        }
        // Rotation deletes before the new segment holds a synced record; with
        // a single slot a crash there would leave no record to resume from
        if self.max_segments < 2 {
            return Err(WalError::InvalidConfig(
                "max_segments must be at least 2".to_string(),
            ));
        }
        if self.sync_interval_ms == 0 {
            return Err(WalError::InvalidConfig(
                "sync_interval_ms must be positive".to_string(),
            ));
        }
        if self.segment_prefix.is_empty() {
            return Err(WalError::InvalidConfig(
                "segment_prefix cannot be empty".to_string(),
            ));
        }
        if self
            .segment_prefix
            .chars()
            .any(|c| c == '/' || c == '\\' || std::path::is_separator(c))
        {
            return Err(WalError::InvalidConfig(format!(
                "segment_prefix {:?} must not contain a path separator",
                self.segment_prefix
            )));
        }
        Ok(())
    }

    /// Get the log directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log directory
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory = path.into();
        self
    }

    /// Set the segment file name prefix
    pub fn segment_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.segment_prefix = prefix.into();
        self
    }

    /// Set the rotation threshold (in bytes)
    pub fn max_segment_size_bytes(mut self, size: u64) -> Self {
        self.config.max_segment_size_bytes = size;
        self
    }

    /// Set the retention cap (number of live segment files)
    pub fn max_segments(mut self, count: usize) -> Self {
        self.config.max_segments = count;
        self
    }

    /// Enable or disable fsync on sync
    pub fn force_sync(mut self, enabled: bool) -> Self {
        self.config.force_sync = enabled;
        self
    }

    /// Set the background sync interval (in milliseconds)
    pub fn sync_interval_ms(mut self, ms: u32) -> Self {
        self.config.sync_interval_ms = ms;
        self
    }

    /// Set the record checksum scheme
    pub fn checksum_scheme(mut self, scheme: ChecksumScheme) -> Self {
        self.config.checksum_scheme = scheme;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
