//! WAL Reader
//!
//! Decodes records from one segment file, front to back.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::config::ChecksumScheme;
use crate::error::{Result, WalError};

use super::record::{decode_body, decode_frame_len, WalRecord, FRAME_HEADER_SIZE};

/// Reads records from a segment file
///
/// Opens its own read-only handle, so it never observes bytes still sitting
/// in a writer's buffer.
pub struct SegmentReader {
    /// Buffered file handle
    reader: BufReader<File>,
    /// Segment number (for error context)
    segment: u64,
    /// Offset of the next frame
    position: u64,
    /// File size at open time
    file_len: u64,
    /// Scheme used to validate checksums
    scheme: ChecksumScheme,
    /// Largest body length accepted as a possibly torn frame
    max_body_len: usize,
    /// Set once the iterator has yielded an error or reached the end
    done: bool,
}

impl SegmentReader {
    /// Open a segment file for reading from offset 0
    ///
    /// `max_body_len` is the largest record body the writer could have
    /// emitted (see [`Config::max_body_len`](crate::Config::max_body_len)).
    pub fn open(
        path: &Path,
        segment: u64,
        scheme: ChecksumScheme,
        max_body_len: usize,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        Ok(Self {
            reader: BufReader::new(file),
            segment,
            position: 0,
            file_len,
            scheme,
            max_body_len,
            done: false,
        })
    }

    /// Read the next record
    ///
    /// Returns:
    /// - `Ok(Some(record))`: a complete, checksum-valid record
    /// - `Ok(None)`: clean end of file at a frame boundary
    /// - `Err(TruncatedRecord)`: the file ends inside a frame (torn write)
    /// - `Err(CorruptRecord)` / `Err(ChecksumMismatch)`: integrity failure
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        let offset = self.position;

        // Step 1: Frame header (0 bytes here is the clean end)
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let read = self.read_fully(&mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < FRAME_HEADER_SIZE {
            return Err(WalError::TruncatedRecord(format!(
                "incomplete frame header: expected {} bytes, got {}",
                FRAME_HEADER_SIZE, read
            ))
            .at(self.segment, offset));
        }

        // Lengths above the limit are corrupt wherever they appear, so a bad
        // length word mid-segment is never mistaken for a torn tail
        let body_len = decode_frame_len(header, self.max_body_len)
            .map_err(|e| e.at(self.segment, offset))?;

        // Step 2: A plausible length running past the end of the file is a
        // torn tail, checked before allocating the body
        let remaining = self
            .file_len
            .saturating_sub(offset + FRAME_HEADER_SIZE as u64);
        if body_len as u64 > remaining {
            return Err(WalError::TruncatedRecord(format!(
                "incomplete record body: expected {} bytes, {} left in file",
                body_len, remaining
            ))
            .at(self.segment, offset));
        }

        let mut body = vec![0u8; body_len];
        let read = self.read_fully(&mut body)?;
        if read < body_len {
            return Err(WalError::TruncatedRecord(format!(
                "incomplete record body: expected {} bytes, got {}",
                body_len, read
            ))
            .at(self.segment, offset));
        }

        // Step 3: Decode and validate
        let record = decode_body(&body).map_err(|e| e.at(self.segment, offset))?;

        let expected = record.expected_checksum(self.scheme);
        if record.checksum != expected {
            return Err(WalError::ChecksumMismatch {
                segment: self.segment,
                offset,
                sequence: record.sequence_number,
                expected,
                actual: record.checksum,
            });
        }

        self.position = offset + (FRAME_HEADER_SIZE + body_len) as u64;
        Ok(Some(record))
    }

    /// Offset just past the last complete record read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Get the segment number
    pub fn segment(&self) -> u64 {
        self.segment
    }

    /// Read until `buf` is full or EOF; returns the byte count
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterate over records; stops after the first error
impl Iterator for SegmentReader {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
