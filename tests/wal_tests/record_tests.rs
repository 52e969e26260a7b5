//! Tests for WAL record encoding and decoding
//!
//! These tests verify:
//! - Round-trip encoding for empty, small and large payloads
//! - Frame length validation (negative, undersized, truncated)
//! - CRC32 corruption detection under both checksum schemes

use walstore::wal::{
    compute_checksum, decode_body, decode_frame_len, WalRecord, FRAME_HEADER_SIZE,
    MAX_BODY_SIZE, RECORD_OVERHEAD,
};
use walstore::{ChecksumScheme, WalError};

const SCHEME: ChecksumScheme = ChecksumScheme::FullSequence;

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_encode_decode_small_payload() {
    let record = WalRecord::new(1, b"value1".to_vec(), SCHEME);

    let bytes = record.encode().unwrap();
    let (decoded, consumed) = WalRecord::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
    assert_eq!(consumed, bytes.len());
    assert!(decoded.verify(SCHEME));
}

#[test]
fn test_encode_decode_empty_payload() {
    let record = WalRecord::new(7, Vec::new(), SCHEME);

    let bytes = record.encode().unwrap();
    let (decoded, _) = WalRecord::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
    assert!(decoded.payload.is_empty());
}

#[test]
fn test_encode_decode_one_byte_payload() {
    let record = WalRecord::new(8, vec![0x42], SCHEME);

    let bytes = record.encode().unwrap();
    let (decoded, _) = WalRecord::decode(&bytes).unwrap();

    assert_eq!(decoded, record);
}

#[test]
fn test_encode_decode_large_payload() {
    let payload = vec![0xAB; 1024 * 1024]; // 1 MB
    let record = WalRecord::new(999, payload.clone(), SCHEME);

    let bytes = record.encode().unwrap();
    let (decoded, _) = WalRecord::decode(&bytes).unwrap();

    assert_eq!(decoded.payload, payload);
    assert_eq!(decoded, record);
}

#[test]
fn test_all_fields_preserved() {
    for seq in [1, 255, 256, u64::MAX] {
        let mut record = WalRecord::new(seq, b"payload".to_vec(), SCHEME);
        record.timestamp = -12345;

        let bytes = record.encode().unwrap();
        let (decoded, _) = WalRecord::decode(&bytes).unwrap();

        assert_eq!(decoded.sequence_number, seq);
        assert_eq!(decoded.timestamp, -12345);
        assert_eq!(decoded.checksum, record.checksum);
    }
}

#[test]
fn test_decode_consumes_one_frame() {
    let first = WalRecord::new(1, b"first".to_vec(), SCHEME);
    let second = WalRecord::new(2, b"second".to_vec(), SCHEME);

    let mut bytes = first.encode().unwrap().to_vec();
    bytes.extend_from_slice(&second.encode().unwrap());

    let (decoded_first, consumed) = WalRecord::decode(&bytes).unwrap();
    let (decoded_second, _) = WalRecord::decode(&bytes[consumed..]).unwrap();

    assert_eq!(decoded_first, first);
    assert_eq!(decoded_second, second);
}

// =============================================================================
// Frame Layout Tests
// =============================================================================

#[test]
fn test_encoded_len_matches() {
    let record = WalRecord::new(1, b"test_value".to_vec(), SCHEME);

    let bytes = record.encode().unwrap();

    assert_eq!(bytes.len(), record.encoded_len());
    assert_eq!(bytes.len(), FRAME_HEADER_SIZE + RECORD_OVERHEAD + 10);
}

#[test]
fn test_length_prefix_is_little_endian() {
    let record = WalRecord::new(1, b"abc".to_vec(), SCHEME);
    let bytes = record.encode().unwrap();

    let prefix = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    assert_eq!(prefix as usize, bytes.len() - FRAME_HEADER_SIZE);
}

#[test]
fn test_negative_frame_length_rejected() {
    let result = decode_frame_len((-1i32).to_le_bytes(), MAX_BODY_SIZE);
    assert!(matches!(result, Err(WalError::CorruptRecord(_))));
}

#[test]
fn test_undersized_frame_length_rejected() {
    let result = decode_frame_len(3i32.to_le_bytes(), MAX_BODY_SIZE);
    assert!(matches!(result, Err(WalError::CorruptRecord(_))));
}

#[test]
fn test_frame_length_above_limit_rejected() {
    let result = decode_frame_len(1025i32.to_le_bytes(), 1024);
    assert!(matches!(result, Err(WalError::CorruptRecord(_))));

    assert_eq!(decode_frame_len(1024i32.to_le_bytes(), 1024).unwrap(), 1024);
}

#[test]
fn test_body_with_trailing_bytes_rejected() {
    let record = WalRecord::new(1, b"abc".to_vec(), SCHEME);
    let bytes = record.encode().unwrap();

    let mut body = bytes[FRAME_HEADER_SIZE..].to_vec();
    body.push(0);

    assert!(matches!(decode_body(&body), Err(WalError::CorruptRecord(_))));
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_empty_buffer() {
    let result = WalRecord::decode(&[]);
    assert!(matches!(result, Err(WalError::TruncatedRecord(_))));
}

#[test]
fn test_partial_header() {
    let result = WalRecord::decode(&[0x10, 0x00]);
    assert!(matches!(result, Err(WalError::TruncatedRecord(_))));
}

#[test]
fn test_truncated_body() {
    let record = WalRecord::new(1, b"some payload".to_vec(), SCHEME);
    let bytes = record.encode().unwrap();

    let result = WalRecord::decode(&bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(WalError::TruncatedRecord(_))));
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_payload_corruption_detected() {
    let record = WalRecord::new(1, b"value".to_vec(), SCHEME);
    let mut bytes = record.encode().unwrap().to_vec();

    // Payload sits right before the trailing 4-byte checksum
    let payload_byte = bytes.len() - 5;
    bytes[payload_byte] ^= 0xFF;

    let (decoded, _) = WalRecord::decode(&bytes).unwrap();
    assert!(!decoded.verify(SCHEME));
}

#[test]
fn test_checksum_covers_sequence_number() {
    let a = compute_checksum(b"same", 1, SCHEME);
    let b = compute_checksum(b"same", 2, SCHEME);
    assert_ne!(a, b);
}

#[test]
fn test_low_byte_scheme_collides_every_256() {
    let low = ChecksumScheme::LowByteSequence;
    assert_eq!(
        compute_checksum(b"same", 1, low),
        compute_checksum(b"same", 257, low)
    );
    assert_ne!(
        compute_checksum(b"same", 1, SCHEME),
        compute_checksum(b"same", 257, SCHEME)
    );
}

#[test]
fn test_low_byte_scheme_matches_payload_plus_byte() {
    let mut data = b"value1".to_vec();
    data.push(3);
    assert_eq!(
        compute_checksum(b"value1", 3, ChecksumScheme::LowByteSequence),
        crc32fast::hash(&data)
    );
}

#[test]
fn test_scheme_mismatch_fails_verification() {
    let record = WalRecord::new(300, b"value".to_vec(), ChecksumScheme::LowByteSequence);
    assert!(record.verify(ChecksumScheme::LowByteSequence));
    assert!(!record.verify(ChecksumScheme::FullSequence));
}
