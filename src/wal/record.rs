//! WAL record definitions
//!
//! Defines the structure of individual WAL records and their framing.
//!
//! ## Frame Layout
//! ```text
//! ┌───────────────┬──────────────────────────────────────────────────────┐
//! │ Len (i32 LE)  │ bincode(WalRecord)                                   │
//! │               │ ┌─────────┬───────────┬──────────┬──────┬─────────┐  │
//! │               │ │ Seq (8) │ Nanos (8) │ PLen (8) │ Data │ CRC (4) │  │
//! │               │ └─────────┴───────────┴──────────┴──────┴─────────┘  │
//! └───────────────┴──────────────────────────────────────────────────────┘
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::config::ChecksumScheme;
use crate::error::{Result, WalError};

/// Size of the length prefix in front of every record
pub const FRAME_HEADER_SIZE: usize = 4;

/// Serialized size of a record with an empty payload
/// (sequence 8 + timestamp 8 + payload length 8 + checksum 4)
pub const RECORD_OVERHEAD: usize = 28;

/// Largest record body an `i32` length prefix can describe
///
/// Only bounds encoding. Readers check lengths against the tighter limit
/// passed to [`decode_frame_len`], derived from the segment size.
pub const MAX_BODY_SIZE: usize = i32::MAX as usize;

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Log Sequence Number - contiguous, starting at 1
    pub sequence_number: u64,

    /// Wall-clock capture at write time (nanoseconds since the Unix epoch)
    pub timestamp: i64,

    /// Caller-supplied opaque bytes
    pub payload: Vec<u8>,

    /// CRC32 over the payload and sequence number
    pub checksum: u32,
}

impl WalRecord {
    /// Build a record stamped with the current time and a fresh checksum
    pub fn new(sequence_number: u64, payload: Vec<u8>, scheme: ChecksumScheme) -> Self {
        let checksum = compute_checksum(&payload, sequence_number, scheme);
        Self {
            sequence_number,
            timestamp: now_nanos(),
            payload,
            checksum,
        }
    }

    /// Checksum this record should carry under `scheme`
    pub fn expected_checksum(&self, scheme: ChecksumScheme) -> u32 {
        compute_checksum(&self.payload, self.sequence_number, scheme)
    }

    /// True if the stored checksum matches the payload and sequence number
    pub fn verify(&self, scheme: ChecksumScheme) -> bool {
        self.checksum == self.expected_checksum(scheme)
    }

    /// Size of the encoded frame (length prefix included)
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + RECORD_OVERHEAD + self.payload.len()
    }

    /// Encode into a length-prefixed frame
    pub fn encode(&self) -> Result<Bytes> {
        let body_len = bincode::serialized_size(self)? as usize;
        if body_len > MAX_BODY_SIZE {
            return Err(WalError::Write(format!(
                "record {} too large: {} bytes (max {})",
                self.sequence_number, body_len, MAX_BODY_SIZE
            )));
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body_len);
        buf.put_i32_le(body_len as i32);
        bincode::serialize_into((&mut buf).writer(), self)?;

        Ok(buf.freeze())
    }

    /// Decode one frame from the front of `bytes`
    ///
    /// Returns the record and the number of bytes consumed. The checksum is
    /// not verified here; see [`WalRecord::verify`].
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(WalError::TruncatedRecord(format!(
                "incomplete frame header: expected {} bytes, got {}",
                FRAME_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&bytes[..FRAME_HEADER_SIZE]);
        let body_len = decode_frame_len(header, MAX_BODY_SIZE)?;

        let total_len = FRAME_HEADER_SIZE + body_len;
        if bytes.len() < total_len {
            return Err(WalError::TruncatedRecord(format!(
                "incomplete record body: expected {} bytes, got {}",
                body_len,
                bytes.len() - FRAME_HEADER_SIZE
            )));
        }

        let record = decode_body(&bytes[FRAME_HEADER_SIZE..total_len])?;
        Ok((record, total_len))
    }
}

/// Parse a frame length prefix
///
/// `max_body_len` is the largest body a writer could have produced; a longer
/// length cannot come from a torn write and is reported as corruption.
pub fn decode_frame_len(header: [u8; FRAME_HEADER_SIZE], max_body_len: usize) -> Result<usize> {
    let len = (&header[..]).get_i32_le();

    if len < 0 {
        return Err(WalError::CorruptRecord(format!(
            "negative frame length {}",
            len
        )));
    }

    let len = len as usize;
    if len < RECORD_OVERHEAD {
        return Err(WalError::CorruptRecord(format!(
            "frame length {} below minimum record size {}",
            len, RECORD_OVERHEAD
        )));
    }
    if len > max_body_len {
        return Err(WalError::CorruptRecord(format!(
            "frame length {} exceeds maximum record size {}",
            len, max_body_len
        )));
    }

    Ok(len)
}

/// Deserialize a record body (the bytes after the length prefix)
pub fn decode_body(body: &[u8]) -> Result<WalRecord> {
    let record: WalRecord = bincode::deserialize(body)
        .map_err(|e| WalError::CorruptRecord(format!("undecodable record body: {}", e)))?;

    // Frame length and the payload length inside the body must agree
    let expected = RECORD_OVERHEAD + record.payload.len();
    if expected != body.len() {
        return Err(WalError::CorruptRecord(format!(
            "record {} body is {} bytes but encodes {}",
            record.sequence_number,
            body.len(),
            expected
        )));
    }

    Ok(record)
}

/// CRC32 (IEEE) over the payload followed by sequence-number bytes
pub fn compute_checksum(payload: &[u8], sequence_number: u64, scheme: ChecksumScheme) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    match scheme {
        ChecksumScheme::LowByteSequence => hasher.update(&[sequence_number as u8]),
        ChecksumScheme::FullSequence => hasher.update(&sequence_number.to_le_bytes()),
    }
    hasher.finalize()
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
