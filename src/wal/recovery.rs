//! WAL Recovery
//!
//! Rebuilds the ordered record history by scanning segment files.

use std::io::ErrorKind;

use crate::config::ChecksumScheme;
use crate::error::{Result, WalError};

use super::reader::SegmentReader;
use super::record::WalRecord;
use super::segment::SegmentFile;

/// Handles WAL recovery after a crash or restart
pub struct WalRecovery;

/// How a scan ended
#[derive(Debug)]
pub enum ScanEnd {
    /// Every segment ended exactly at a frame boundary
    Clean,

    /// The last segment ends inside a frame (torn write); everything before
    /// `offset` was recovered
    TornTail { segment: u64, offset: u64 },

    /// An integrity failure stopped the scan; records before it were kept
    Corrupt {
        segment: u64,
        offset: u64,
        error: WalError,
    },
}

/// Result of a recovery operation
#[derive(Debug)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub records_recovered: u64,

    /// Number of corrupted records that stopped the scan (0 or 1)
    pub records_corrupted: u64,

    /// Last valid sequence number (0 if none)
    pub last_sequence: u64,

    /// Number of segment files opened
    pub segments_scanned: usize,

    /// Termination condition
    pub end: ScanEnd,
}

impl RecoveryResult {
    fn new() -> Self {
        Self {
            records_recovered: 0,
            records_corrupted: 0,
            last_sequence: 0,
            segments_scanned: 0,
            end: ScanEnd::Clean,
        }
    }

    /// True if the scan ended at a frame boundary with no damage
    pub fn is_clean(&self) -> bool {
        matches!(self.end, ScanEnd::Clean)
    }

    /// True if the last segment ended with a partial record
    pub fn was_truncated(&self) -> bool {
        matches!(self.end, ScanEnd::TornTail { .. })
    }

    /// True if an integrity failure stopped the scan
    pub fn is_corrupt(&self) -> bool {
        matches!(self.end, ScanEnd::Corrupt { .. })
    }
}

impl WalRecovery {
    /// Recover records from segments, in the order given
    ///
    /// This will:
    /// 1. Read all valid records segment by segment
    /// 2. Tolerate a torn tail in the last segment
    /// 3. Stop at the first corrupt record, sequence gap, or torn sealed segment
    /// 4. Return the records collected before the stop, in order
    ///
    /// `max_body_len` bounds frame lengths; see [`SegmentReader::open`].
    /// I/O failures other than a short read are returned as `Err`.
    pub fn recover(
        segments: &[SegmentFile],
        scheme: ChecksumScheme,
        max_body_len: usize,
    ) -> Result<(Vec<WalRecord>, RecoveryResult)> {
        let mut records = Vec::new();
        let result = Self::scan(segments, scheme, max_body_len, |record| records.push(record))?;
        Ok((records, result))
    }

    /// Recover records from a single segment
    pub fn recover_segment(
        segment: &SegmentFile,
        scheme: ChecksumScheme,
        max_body_len: usize,
    ) -> Result<(Vec<WalRecord>, RecoveryResult)> {
        Self::recover(std::slice::from_ref(segment), scheme, max_body_len)
    }

    /// Verify integrity of segments without keeping the records
    pub fn verify(
        segments: &[SegmentFile],
        scheme: ChecksumScheme,
        max_body_len: usize,
    ) -> Result<RecoveryResult> {
        Self::scan(segments, scheme, max_body_len, |_| {})
    }

    fn scan<F>(
        segments: &[SegmentFile],
        scheme: ChecksumScheme,
        max_body_len: usize,
        mut sink: F,
    ) -> Result<RecoveryResult>
    where
        F: FnMut(WalRecord),
    {
        let mut result = RecoveryResult::new();

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();

            let opened = SegmentReader::open(&segment.path, segment.number, scheme, max_body_len);
            let mut reader = match opened {
                Ok(reader) => reader,
                // Retention may delete the oldest segment between listing and
                // scanning; that is only harmless before any record was kept
                Err(WalError::Io(e)) if e.kind() == ErrorKind::NotFound && result.records_recovered == 0 => {
                    tracing::debug!(segment = segment.number, "Segment vanished before scan, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            result.segments_scanned += 1;

            loop {
                let offset = reader.position();
                match reader.next_record() {
                    Ok(Some(record)) => {
                        let expected = result.last_sequence + 1;
                        if result.records_recovered > 0 && record.sequence_number != expected {
                            result.records_corrupted += 1;
                            result.end = ScanEnd::Corrupt {
                                segment: segment.number,
                                offset,
                                error: WalError::CorruptRecord(format!(
                                    "expected sequence {}, found {}",
                                    expected, record.sequence_number
                                ))
                                .at(segment.number, offset),
                            };
                            return Ok(result);
                        }

                        result.last_sequence = record.sequence_number;
                        result.records_recovered += 1;
                        sink(record);
                    }
                    Ok(None) => break,
                    Err(WalError::TruncatedRecord(reason)) => {
                        if is_last {
                            tracing::debug!(
                                segment = segment.number,
                                offset,
                                "WAL scan stopped at torn tail: {}",
                                reason
                            );
                            result.end = ScanEnd::TornTail {
                                segment: segment.number,
                                offset,
                            };
                        } else {
                            // Sealed segments are flushed before rotation, so a
                            // partial frame there is damage, not a crash artefact
                            result.records_corrupted += 1;
                            result.end = ScanEnd::Corrupt {
                                segment: segment.number,
                                offset,
                                error: WalError::CorruptRecord(format!(
                                    "sealed segment ends with a partial record ({})",
                                    reason
                                )),
                            };
                        }
                        return Ok(result);
                    }
                    Err(e) if e.is_corruption() => {
                        tracing::warn!(segment = segment.number, offset, "WAL scan stopped: {}", e);
                        result.records_corrupted += 1;
                        result.end = ScanEnd::Corrupt {
                            segment: segment.number,
                            offset,
                            error: e,
                        };
                        return Ok(result);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(result)
    }
}
