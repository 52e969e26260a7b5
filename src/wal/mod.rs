//! Write-Ahead Log (WAL) Module
//!
//! Building blocks of the log engine.
//!
//! ## Responsibilities
//! - Length-prefixed record framing with CRC32 checksums
//! - Segment file discovery, naming, creation and deletion
//! - Buffered appends to the active segment
//! - Sequential scans with torn-tail tolerance
//! - Periodic background sync
//!
//! ## Segment File Format
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Frame 1                                  │
//! │ ┌──────────┬───────────────────────────┐ │
//! │ │ Len (4)  │ bincode(WalRecord)        │ │
//! │ └──────────┴───────────────────────────┘ │
//! ├──────────────────────────────────────────┤
//! │ Frame 2                                  │
//! │ ┌──────────┬───────────────────────────┐ │
//! │ │ Len (4)  │ bincode(WalRecord)        │ │
//! │ └──────────┴───────────────────────────┘ │
//! └──────────────────────────────────────────┘
//! ```

mod reader;
mod record;
mod recovery;
mod scheduler;
mod segment;
mod writer;

pub use reader::SegmentReader;
pub use record::{
    compute_checksum, decode_body, decode_frame_len, WalRecord, FRAME_HEADER_SIZE,
    MAX_BODY_SIZE, RECORD_OVERHEAD,
};
pub use recovery::{RecoveryResult, ScanEnd, WalRecovery};
pub use scheduler::SyncScheduler;
pub use segment::{
    parse_segment_number, segment_file_name, SegmentDirectory, SegmentFile,
    FIRST_SEGMENT_NUMBER, SEGMENT_EXTENSION,
};
pub use writer::{SegmentWriter, WRITE_BUFFER_CAPACITY};
