//! # walstore
//!
//! A durable, append-only write-ahead log with:
//! - Monotonic sequence numbers for every record
//! - CRC32-guarded, length-prefixed binary records
//! - Size-based segment rotation with a retention cap
//! - Buffered writes with periodic background fsync
//! - Crash recovery with torn-tail handling
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Caller                              │
//! │            write / sync / read_all_records / close          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                               │
//! │       (single writer lock: sequence, buffer, rotation)      │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌───────────────┐    ┌───────────────┐      ┌──────────────┐
//!  │ SegmentWriter │    │ SyncScheduler │      │ WalRecovery  │
//!  │   (append)    │    │ (background)  │      │   (scan)     │
//!  └──────┬────────┘    └───────────────┘      └──────┬───────┘
//!         │                                           │
//!         ▼                                           ▼
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │        SegmentDirectory: wal-segment-1.log, -2.log, ...     │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use walstore::{Config, Engine};
//!
//! # fn main() -> walstore::Result<()> {
//! let engine = Engine::start(Config::new("/tmp/my-wal"))?;
//! let seq = engine.write(b"hello")?;
//! engine.sync()?;
//!
//! let records = engine.read_all_records()?;
//! assert_eq!(records.last().map(|r| r.sequence_number), Some(seq));
//! engine.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod engine;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{ChecksumScheme, Config};
pub use engine::Engine;
pub use error::{Result, WalError};
pub use wal::{RecoveryResult, ScanEnd, WalRecord};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of walstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
