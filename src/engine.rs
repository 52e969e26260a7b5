//! Engine Module
//!
//! The log engine that coordinates all WAL components.
//!
//! ## Responsibilities
//! - Discover or create the active segment on startup
//! - Recover the last sequence number after a restart or crash
//! - Assign sequence numbers and buffer encoded records
//! - Rotate segments by size and enforce the retention cap
//! - Sync periodically in the background and on demand

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ChecksumScheme, Config};
use crate::error::{Result, WalError};
use crate::wal::{
    RecoveryResult, ScanEnd, SegmentDirectory, SegmentFile, SegmentWriter, SyncScheduler,
    WalRecord, WalRecovery, FIRST_SEGMENT_NUMBER,
};

/// The write-ahead log engine
///
/// ## Concurrency Model: Single Writer Lock
///
/// - **Writes** (write/sync/rotation): Serialized by one mutex around
///   `WalState`
///   - Sequence assignment, rotation and buffer append happen atomically
///   - The background sync takes the same lock, so it never sees half a frame
///
/// - **Scans** (read_all_records/recover): Flush under the lock, then read
///   the segment files through independent handles without holding it
///
/// Only one engine may own a directory at a time. This is not enforced.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Mutable log state, shared with the sync thread
    state: Arc<Mutex<WalState>>,

    /// Background sync task
    scheduler: SyncScheduler,

    /// Set once `close` (or drop) has run
    closed: bool,
}

/// State guarded by the engine lock
struct WalState {
    /// Segment files of this log
    directory: SegmentDirectory,

    /// Writer for the active segment (`None` once closed)
    active: Option<SegmentWriter>,

    /// Numbers of all segment files currently on disk
    live_segments: BTreeSet<u64>,

    /// Last sequence number handed out (0 = none)
    last_sequence: u64,

    max_segment_size: u64,
    max_segments: usize,
    force_sync: bool,
    checksum_scheme: ChecksumScheme,
}

impl Engine {
    /// Name of the background sync thread
    const SYNC_THREAD_NAME: &'static str = "walstore-sync";

    /// Start an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Create the directory if it doesn't exist
    /// 3. Discover segments; create segment 1 for a fresh log
    /// 4. Recover the last sequence number (truncating a torn tail)
    /// 5. Launch the background sync task
    pub fn start(config: Config) -> Result<Self> {
        // Step 1: Validate
        config.validate()?;

        // Step 2: Create directory
        fs::create_dir_all(&config.directory)?;
        let directory = SegmentDirectory::new(&config.directory, &config.segment_prefix);

        // Step 3: Discover existing segments
        let segments = directory.discover()?;

        // Step 4: Pick the active segment and recover the sequence counter
        let (active, last_sequence) = match segments.last() {
            None => {
                let writer =
                    SegmentWriter::create(&directory, FIRST_SEGMENT_NUMBER, config.force_sync)?;
                (writer, 0)
            }
            Some(latest) => {
                let last_sequence = Self::recover_last_sequence(&directory, &segments, &config)?;
                let writer = SegmentWriter::open(&directory, latest.number, config.force_sync)?;
                (writer, last_sequence)
            }
        };

        let mut live_segments: BTreeSet<u64> = segments.iter().map(|s| s.number).collect();
        live_segments.insert(active.number());

        tracing::info!(
            dir = %config.directory.display(),
            active_segment = active.number(),
            live_segments = live_segments.len(),
            last_sequence,
            "WAL started"
        );

        let state = Arc::new(Mutex::new(WalState {
            directory,
            active: Some(active),
            live_segments,
            last_sequence,
            max_segment_size: config.max_segment_size_bytes,
            max_segments: config.max_segments,
            force_sync: config.force_sync,
            checksum_scheme: config.checksum_scheme,
        }));

        // Step 5: Background sync
        let tick_state = Arc::clone(&state);
        let scheduler = SyncScheduler::start(
            Self::SYNC_THREAD_NAME,
            config.sync_interval(),
            move || tick_state.lock().sync(),
        )?;

        Ok(Self {
            config,
            state,
            scheduler,
            closed: false,
        })
    }

    /// Start with a path (convenience method)
    ///
    /// Uses default config with the specified directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::start(Config::new(path))
    }

    /// Append a payload, returning its sequence number
    ///
    /// The record is buffered, not yet durable: it reaches disk on the next
    /// background tick, an explicit `sync`, or `close`.
    pub fn write(&self, payload: &[u8]) -> Result<u64> {
        self.state.lock().append(payload)
    }

    /// Append several payloads under one lock acquisition
    ///
    /// Stops at the first failure; payloads before it stay written.
    pub fn write_batch<I, P>(&self, payloads: I) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut state = self.state.lock();
        payloads
            .into_iter()
            .map(|payload| state.append(payload.as_ref()))
            .collect()
    }

    /// Flush the write buffer and fsync (if enabled)
    ///
    /// Resets the background sync timer.
    pub fn sync(&self) -> Result<()> {
        self.state.lock().sync()?;
        self.scheduler.reset();
        Ok(())
    }

    /// Read every record of every live segment, in order
    ///
    /// A torn tail in the active segment ends the scan successfully. A
    /// corrupt record is returned as an error; use [`Engine::recover`] to get
    /// the records read before it.
    pub fn read_all_records(&self) -> Result<Vec<WalRecord>> {
        let (records, result) = self.recover()?;
        match result.end {
            ScanEnd::Corrupt { error, .. } => Err(error),
            ScanEnd::Clean | ScanEnd::TornTail { .. } => Ok(records),
        }
    }

    /// Scan all live segments and report how the scan ended
    pub fn recover(&self) -> Result<(Vec<WalRecord>, RecoveryResult)> {
        let segments = self.state.lock().flushed_segments()?;
        WalRecovery::recover(
            &segments,
            self.config.checksum_scheme,
            self.config.max_body_len(),
        )
    }

    /// Scan only the active segment
    pub fn read_active_segment(&self) -> Result<(Vec<WalRecord>, RecoveryResult)> {
        let segment = {
            let mut state = self.state.lock();
            let segments = state.flushed_segments()?;
            segments
                .into_iter()
                .last()
                .ok_or_else(|| WalError::Write("WAL is closed".to_string()))?
        };
        WalRecovery::recover_segment(
            &segment,
            self.config.checksum_scheme,
            self.config.max_body_len(),
        )
    }

    /// Close the engine gracefully
    ///
    /// Stops the background task, performs a final sync and closes the active
    /// segment. If this fails, buffered records may not be durable.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.scheduler.stop();

        let mut state = self.state.lock();
        let last_sequence = state.last_sequence;
        if let Some(active) = state.active.take() {
            active.close()?;
        }

        tracing::info!(
            dir = %self.config.directory.display(),
            last_sequence,
            "WAL closed"
        );
        Ok(())
    }

    /// Find the last written sequence number
    ///
    /// Scans the newest segment; a torn tail there is cut off so appends
    /// resume at a frame boundary. An empty newest segment (crash right after
    /// rotation) falls back to the sealed segments, newest first.
    fn recover_last_sequence(
        directory: &SegmentDirectory,
        segments: &[SegmentFile],
        config: &Config,
    ) -> Result<u64> {
        for (index, segment) in segments.iter().enumerate().rev() {
            let is_active = index + 1 == segments.len();
            let result = WalRecovery::verify(
                std::slice::from_ref(segment),
                config.checksum_scheme,
                config.max_body_len(),
            )?;

            match result.end {
                ScanEnd::Clean => {}
                ScanEnd::TornTail { segment: number, offset } if is_active => {
                    tracing::warn!(
                        segment = number,
                        offset,
                        records = result.records_recovered,
                        "Truncating torn tail of active WAL segment"
                    );
                    directory.truncate_segment(number, offset)?;
                }
                ScanEnd::TornTail { .. } => {}
                ScanEnd::Corrupt { error, .. } => return Err(error),
            }

            if result.records_recovered > 0 {
                return Ok(result.last_sequence);
            }
        }

        Ok(0)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Last sequence number handed out (0 if the log is empty)
    pub fn last_sequence(&self) -> u64 {
        self.state.lock().last_sequence
    }

    /// Number of the active segment
    pub fn active_segment(&self) -> u64 {
        let state = self.state.lock();
        state
            .active
            .as_ref()
            .map(SegmentWriter::number)
            .or_else(|| state.live_segments.iter().next_back().copied())
            .unwrap_or(FIRST_SEGMENT_NUMBER)
    }

    /// Numbers of all live segment files, oldest first
    pub fn live_segments(&self) -> Vec<u64> {
        self.state.lock().live_segments.iter().copied().collect()
    }

    /// Get the log directory
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Failed to close WAL on drop: {}", e);
        }
    }
}

impl WalState {
    fn writer(&mut self) -> Result<&mut SegmentWriter> {
        self.active
            .as_mut()
            .ok_or_else(|| WalError::Write("WAL is closed".to_string()))
    }

    /// Assign the next sequence number and buffer the record
    ///
    /// `last_sequence` only advances once the frame is in the buffer.
    fn append(&mut self, payload: &[u8]) -> Result<u64> {
        // Step 1: Next sequence number
        let sequence = self.last_sequence + 1;

        // Step 2: Build and encode the record
        let record = WalRecord::new(sequence, payload.to_vec(), self.checksum_scheme);
        let frame = record.encode().map_err(|e| match e {
            WalError::Write(_) => e,
            other => WalError::Write(format!("failed to encode record {}: {}", sequence, other)),
        })?;
        let frame_len = frame.len() as u64;

        if frame_len > self.max_segment_size {
            return Err(WalError::Write(format!(
                "record {} is {} bytes, larger than the {}-byte segment limit",
                sequence, frame_len, self.max_segment_size
            )));
        }

        // Step 3: Rotate before the frame would reach the size limit
        let max_segment_size = self.max_segment_size;
        let writer = self.writer()?;
        if !writer.is_empty() && writer.len() + frame_len >= max_segment_size {
            self.rotate()?;
        }

        // Step 4: Buffer
        self.writer()?.append(&frame).map_err(|e| {
            WalError::Write(format!("failed to buffer record {}: {}", sequence, e))
        })?;

        self.last_sequence = sequence;
        Ok(sequence)
    }

    /// Flush the buffer, then fsync if enabled
    fn sync(&mut self) -> Result<()> {
        match self.active.as_mut() {
            Some(writer) => writer.sync(),
            None => Ok(()),
        }
    }

    /// Seal the active segment and switch to the next one
    ///
    /// Steps:
    /// 1. Sync the active segment
    /// 2. Delete the oldest segments until the new one fits the cap
    /// 3. Create the next segment and make it active
    fn rotate(&mut self) -> Result<()> {
        // Step 1: Seal
        let writer = self.writer()?;
        writer.sync()?;
        let sealed = writer.number();
        let next = sealed + 1;

        // Step 2: Retention (one deletion per rotation once at the cap)
        while self.live_segments.len() + 1 > self.max_segments {
            let oldest = match self.live_segments.iter().next() {
                Some(&oldest) => oldest,
                None => break,
            };
            self.directory.delete_segment(oldest)?;
            self.live_segments.remove(&oldest);
        }

        // Step 3: Open the next segment; on failure the sealed one stays active
        let writer = SegmentWriter::create(&self.directory, next, self.force_sync)?;
        self.live_segments.insert(next);
        if let Some(previous) = self.active.replace(writer) {
            previous.close()?;
        }

        tracing::debug!(
            sealed,
            active = next,
            live_segments = self.live_segments.len(),
            "Rotated WAL segment"
        );
        Ok(())
    }

    /// Flush the buffer to the OS and list live segments oldest first
    fn flushed_segments(&mut self) -> Result<Vec<SegmentFile>> {
        if let Some(writer) = self.active.as_mut() {
            writer.flush()?;
        }

        Ok(self
            .live_segments
            .iter()
            .map(|&number| SegmentFile {
                number,
                path: self.directory.segment_path(number),
            })
            .collect())
    }
}
