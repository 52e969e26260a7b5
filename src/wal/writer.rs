//! WAL segment writer
//!
//! Buffered append handle for the active segment.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::error::{Result, WalError};

use super::segment::SegmentDirectory;

/// Capacity of the in-memory write buffer
pub const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;

/// Appends encoded frames to one segment file
pub struct SegmentWriter {
    /// Segment number this writer appends to
    number: u64,
    /// Buffered writer over the segment file
    writer: BufWriter<File>,
    /// Bytes on disk plus bytes still buffered
    len: u64,
    /// Whether `sync` issues an fsync after flushing
    force_sync: bool,
    /// Set when a failed write could not be rolled back
    failed: bool,
}

impl SegmentWriter {
    /// Create a brand-new segment and open it for appending
    pub fn create(directory: &SegmentDirectory, number: u64, force_sync: bool) -> Result<Self> {
        let file = directory.create_segment(number)?;
        if force_sync {
            directory.sync_dir()?;
        }
        Ok(Self::from_file(number, file, 0, force_sync))
    }

    /// Open an existing segment positioned at its end
    pub fn open(directory: &SegmentDirectory, number: u64, force_sync: bool) -> Result<Self> {
        let file = directory.open_for_append(number)?;
        let len = file.metadata()?.len();
        Ok(Self::from_file(number, file, len, force_sync))
    }

    fn from_file(number: u64, file: File, len: u64, force_sync: bool) -> Self {
        Self {
            number,
            writer: BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file),
            len,
            force_sync,
            failed: false,
        }
    }

    /// Append one encoded frame to the buffer
    ///
    /// The frame is not durable until the next `sync`. If the write fails
    /// part-way, any bytes of the frame that reached the file are cut off
    /// again so the next append starts at a frame boundary.
    pub fn append(&mut self, frame: &[u8]) -> Result<()> {
        self.check_usable()?;

        if let Err(e) = self.writer.write_all(frame) {
            self.rollback();
            return Err(e.into());
        }
        self.len += frame.len() as u64;
        Ok(())
    }

    /// Push buffered bytes to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable()?;

        if let Err(e) = self.writer.flush() {
            self.rollback();
            return Err(e.into());
        }
        Ok(())
    }

    /// Flush, then fsync if force-sync is enabled
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        if self.force_sync {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to the bytes that belong to complete frames
    ///
    /// `BufWriter` drains what it managed to write from its buffer, so the
    /// file plus the buffer always hold `len` bytes of whole frames, followed
    /// on disk by whatever part of a directly written frame got through.
    fn rollback(&mut self) {
        let consistent = self.len - self.writer.buffer().len() as u64;

        let on_disk = match self.writer.get_ref().metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => return self.fail(consistent, e),
        };
        if on_disk < consistent {
            let error = std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("segment is {} bytes, expected at least {}", on_disk, consistent),
            );
            return self.fail(consistent, error);
        }

        if let Err(e) = self.writer.get_ref().set_len(consistent) {
            return self.fail(consistent, e);
        }
        if on_disk > consistent {
            tracing::warn!(
                segment = self.number,
                dropped = on_disk - consistent,
                "Rolled back partial frame after failed write"
            );
        }
    }

    fn fail(&mut self, consistent: u64, error: std::io::Error) {
        tracing::error!(
            segment = self.number,
            offset = consistent,
            "Could not roll back failed write, refusing further appends: {}",
            error
        );
        self.failed = true;
    }

    fn check_usable(&self) -> Result<()> {
        if self.failed {
            return Err(WalError::Write(format!(
                "segment {} has an unrecoverable partial write",
                self.number
            )));
        }
        Ok(())
    }

    /// Sync and release the file handle
    pub fn close(mut self) -> Result<()> {
        self.sync()?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())?;
        drop(file);
        Ok(())
    }

    /// Get the segment number
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Segment size once everything buffered is flushed
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if nothing was ever written to this segment
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes appended but not yet handed to the OS
    pub fn buffered_len(&self) -> usize {
        self.writer.buffer().len()
    }

    /// True once a failed write could not be rolled back
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}
