//! WAL segment directory
//!
//! Discovers, names, creates and deletes segment files.
//! Segments are named `<prefix><N>.log` where `N` is a decimal segment
//! number, e.g. `wal-segment-42.log`.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

/// Number of the first segment of a fresh log
pub const FIRST_SEGMENT_NUMBER: u64 = 1;

/// File extension shared by all segment files
pub const SEGMENT_EXTENSION: &str = ".log";

/// A segment file found on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentFile {
    /// Segment number (creation order)
    pub number: u64,
    /// Full path to the file
    pub path: PathBuf,
}

/// Segment files of one log directory
#[derive(Debug, Clone)]
pub struct SegmentDirectory {
    dir: PathBuf,
    prefix: String,
}

impl SegmentDirectory {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Get the segment file name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// List all segment files, ordered by segment number
    ///
    /// Any regular file carrying the prefix must parse, otherwise the whole
    /// listing fails: a stray file next to the log means the directory was
    /// tampered with.
    pub fn discover(&self) -> Result<Vec<SegmentFile>> {
        let mut segments = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if !name.starts_with(&self.prefix) {
                continue;
            }

            let number = parse_segment_number(&self.prefix, &name).ok_or_else(|| {
                WalError::MalformedSegmentName {
                    name: name.to_string(),
                }
            })?;

            segments.push(SegmentFile {
                number,
                path: entry.path(),
            });
        }

        segments.sort();
        Ok(segments)
    }

    /// Lowest-numbered segment, if any
    pub fn oldest(&self) -> Result<Option<SegmentFile>> {
        Ok(self.discover()?.into_iter().next())
    }

    /// Highest-numbered segment, if any
    pub fn latest(&self) -> Result<Option<SegmentFile>> {
        Ok(self.discover()?.pop())
    }

    /// Create a new, empty segment file opened for writing
    ///
    /// Fails if the file already exists.
    pub fn create_segment(&self, number: u64) -> Result<File> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.segment_path(number))?;

        tracing::debug!(segment = number, dir = %self.dir.display(), "Created WAL segment");
        Ok(file)
    }

    /// Open an existing segment for appending
    pub fn open_for_append(&self, number: u64) -> Result<File> {
        let file = OpenOptions::new()
            .append(true)
            .open(self.segment_path(number))?;
        Ok(file)
    }

    /// Delete a segment file; deleting a missing segment succeeds
    pub fn delete_segment(&self, number: u64) -> Result<()> {
        match fs::remove_file(self.segment_path(number)) {
            Ok(()) => {
                tracing::debug!(segment = number, dir = %self.dir.display(), "Deleted WAL segment");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Cut a segment back to `len` bytes (drops a torn tail)
    pub fn truncate_segment(&self, number: u64, len: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.segment_path(number))?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    /// Persist directory entries (file creation/deletion)
    #[cfg(unix)]
    pub fn sync_dir(&self) -> Result<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    /// Persist directory entries (not supported on this platform)
    #[cfg(not(unix))]
    pub fn sync_dir(&self) -> Result<()> {
        Ok(())
    }

    /// Generate the file path for a segment number
    pub fn segment_path(&self, number: u64) -> PathBuf {
        self.dir.join(segment_file_name(&self.prefix, number))
    }
}

/// "wal-segment-", 42 → "wal-segment-42.log"
pub fn segment_file_name(prefix: &str, number: u64) -> String {
    format!("{}{}{}", prefix, number, SEGMENT_EXTENSION)
}

/// Parse a segment number from a file name
/// "wal-segment-42.log" → Some(42)
///
/// Only the canonical decimal form is accepted, so "wal-segment-042.log"
/// and "wal-segment-+42.log" are rejected.
pub fn parse_segment_number(prefix: &str, file_name: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(prefix)?
        .strip_suffix(SEGMENT_EXTENSION)?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    digits.parse().ok()
}
