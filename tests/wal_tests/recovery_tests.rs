//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from clean segments (single and multiple)
//! - Recovery from an empty segment
//! - Recovery with partial writes (torn tail)
//! - Recovery with corrupted records (CRC mismatch, sequence gap)
//! - Verify mode (stats only, no records returned)

use std::fs::File;
use std::io::Write;

use tempfile::TempDir;
use walstore::wal::{SegmentFile, WalRecord, WalRecovery};
use walstore::{ChecksumScheme, ScanEnd, WalError};

const SCHEME: ChecksumScheme = ChecksumScheme::FullSequence;

/// Body limit of a log with 1 MiB segments
const MAX_BODY: usize = 1024 * 1024 - 4;

// =============================================================================
// Helper Functions
// =============================================================================

fn segment(temp: &TempDir, number: u64) -> SegmentFile {
    SegmentFile {
        number,
        path: temp.path().join(format!("wal-segment-{}.log", number)),
    }
}

fn record(seq: u64) -> WalRecord {
    WalRecord::new(seq, format!("value{}", seq).into_bytes(), SCHEME)
}

/// Write raw frames directly to a file (for crafting corruption)
fn write_segment(segment: &SegmentFile, records: &[WalRecord], tail: &[u8]) {
    let mut file = File::create(&segment.path).unwrap();
    for record in records {
        file.write_all(&record.encode().unwrap()).unwrap();
    }
    file.write_all(tail).unwrap();
    file.sync_all().unwrap();
}

fn records(range: std::ops::RangeInclusive<u64>) -> Vec<WalRecord> {
    range.map(record).collect()
}

// =============================================================================
// Recover: Clean Segment Tests
// =============================================================================

#[test]
fn test_recover_empty_segment() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    write_segment(&seg, &[], &[]);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert!(recovered.is_empty());
    assert_eq!(result.records_recovered, 0);
    assert_eq!(result.records_corrupted, 0);
    assert_eq!(result.last_sequence, 0);
    assert_eq!(result.segments_scanned, 1);
    assert!(result.is_clean());
}

#[test]
fn test_recover_multiple_records() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    write_segment(&seg, &records(1..=10), &[]);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 10);
    assert_eq!(result.records_recovered, 10);
    assert_eq!(result.last_sequence, 10);
    assert!(result.is_clean());

    for (i, record) in recovered.iter().enumerate() {
        assert_eq!(record.sequence_number, (i + 1) as u64);
        assert_eq!(record.payload, format!("value{}", i + 1).into_bytes());
    }
}

#[test]
fn test_recover_across_segments_in_order() {
    let temp = TempDir::new().unwrap();
    let segments = vec![segment(&temp, 3), segment(&temp, 4), segment(&temp, 5)];
    write_segment(&segments[0], &records(21..=30), &[]);
    write_segment(&segments[1], &records(31..=40), &[]);
    write_segment(&segments[2], &records(41..=45), &[]);

    let (recovered, result) = WalRecovery::recover(&segments, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 25);
    assert_eq!(recovered.first().unwrap().sequence_number, 21);
    assert_eq!(result.last_sequence, 45);
    assert_eq!(result.segments_scanned, 3);
    assert!(result.is_clean());
}

// =============================================================================
// Recover: Partial Write Tests (torn tail)
// =============================================================================

#[test]
fn test_recover_partial_header_at_tail() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    let good = records(1..=3);
    let good_len: usize = good.iter().map(WalRecord::encoded_len).sum();
    write_segment(&seg, &good, &[0x40, 0x00, 0x00]);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 3);
    assert_eq!(result.last_sequence, 3);
    assert_eq!(result.records_corrupted, 0);
    assert!(result.was_truncated());
    match result.end {
        ScanEnd::TornTail { segment, offset } => {
            assert_eq!(segment, 1);
            assert_eq!(offset, good_len as u64);
        }
        other => panic!("Expected TornTail, got {:?}", other),
    }
}

#[test]
fn test_recover_partial_body_at_tail() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    let torn = record(2).encode().unwrap();
    write_segment(&seg, &records(1..=1), &torn[..10]);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 1);
    assert!(result.was_truncated());
}

#[test]
fn test_torn_sealed_segment_is_corruption() {
    let temp = TempDir::new().unwrap();
    let segments = vec![segment(&temp, 1), segment(&temp, 2)];
    let torn = record(3).encode().unwrap();
    write_segment(&segments[0], &records(1..=2), &torn[..8]);
    write_segment(&segments[1], &records(3..=4), &[]);

    let (recovered, result) = WalRecovery::recover(&segments, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 2);
    assert!(result.is_corrupt());
    assert_eq!(result.segments_scanned, 1);
}

// =============================================================================
// Recover: Corruption Tests
// =============================================================================

#[test]
fn test_recover_checksum_mismatch_keeps_prefix() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);

    let mut bad = record(3);
    bad.payload[0] ^= 0xFF;
    let mut all = records(1..=2);
    all.push(bad);
    all.push(record(4));
    write_segment(&seg, &all, &[]);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    // Scan stops at the bad record; record 4 is not returned
    assert_eq!(recovered.len(), 2);
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.records_corrupted, 1);
    assert_eq!(result.last_sequence, 2);
    match result.end {
        ScanEnd::Corrupt { error, .. } => {
            assert!(matches!(error, WalError::ChecksumMismatch { sequence: 3, .. }))
        }
        other => panic!("Expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_recover_corruption_at_first_record() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);

    let mut bytes = record(1).encode().unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF; // checksum byte
    write_segment(&seg, &[], &bytes);

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert!(recovered.is_empty());
    assert_eq!(result.records_corrupted, 1);
    assert_eq!(result.last_sequence, 0);
    assert!(result.is_corrupt());
}

#[test]
fn test_bad_length_in_last_segment_is_not_a_torn_tail() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    let originals = records(1..=5);
    write_segment(&seg, &originals, &[]);

    let mut bytes = std::fs::read(&seg.path).unwrap();
    let start = originals[0].encoded_len();
    bytes[start..start + 4].copy_from_slice(&i32::MAX.to_le_bytes());
    std::fs::write(&seg.path, &bytes).unwrap();

    let (recovered, result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 1);
    assert!(!result.was_truncated());
    match result.end {
        ScanEnd::Corrupt { segment, offset, error } => {
            assert_eq!(segment, 1);
            assert_eq!(offset, start as u64);
            assert!(matches!(error, WalError::CorruptRecord(_)));
        }
        other => panic!("Expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_recover_sequence_gap_is_corruption() {
    let temp = TempDir::new().unwrap();
    let segments = vec![segment(&temp, 1), segment(&temp, 2)];
    write_segment(&segments[0], &records(1..=3), &[]);
    write_segment(&segments[1], &records(5..=6), &[]);

    let (recovered, result) = WalRecovery::recover(&segments, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 3);
    match result.end {
        ScanEnd::Corrupt { segment, offset, error } => {
            assert_eq!(segment, 2);
            assert_eq!(offset, 0);
            assert!(matches!(error, WalError::CorruptRecord(_)));
        }
        other => panic!("Expected Corrupt, got {:?}", other),
    }
}

#[test]
fn test_missing_oldest_segment_is_skipped() {
    let temp = TempDir::new().unwrap();
    let segments = vec![segment(&temp, 1), segment(&temp, 2)];
    // Segment 1 was deleted by retention after the listing was taken
    write_segment(&segments[1], &records(11..=12), &[]);

    let (recovered, result) = WalRecovery::recover(&segments, SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), 2);
    assert_eq!(result.segments_scanned, 1);
    assert!(result.is_clean());
}

// =============================================================================
// Verify Tests (stats only, same logic as recover)
// =============================================================================

#[test]
fn test_recover_and_verify_agree() {
    let temp = TempDir::new().unwrap();
    let seg = segment(&temp, 1);
    let torn = record(21).encode().unwrap();
    write_segment(&seg, &records(1..=20), &torn[..5]);

    let (recovered, recover_result) = WalRecovery::recover_segment(&seg, SCHEME, MAX_BODY).unwrap();
    let verify_result = WalRecovery::verify(std::slice::from_ref(&seg), SCHEME, MAX_BODY).unwrap();

    assert_eq!(recovered.len(), recover_result.records_recovered as usize);
    assert_eq!(recover_result.records_recovered, verify_result.records_recovered);
    assert_eq!(recover_result.records_corrupted, verify_result.records_corrupted);
    assert_eq!(recover_result.last_sequence, verify_result.last_sequence);
    assert_eq!(recover_result.was_truncated(), verify_result.was_truncated());
}
