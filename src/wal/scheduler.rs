//! Durability scheduler
//!
//! Background thread that runs a sync callback on a fixed interval.
//!
//! The thread parks on a channel with a timeout:
//! - timeout  → run the tick
//! - signal   → restart the wait (timer reset)
//! - hang-up  → exit without a final tick

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::error::Result;

/// Cancellable periodic task
pub struct SyncScheduler {
    /// Reset signal; dropping it stops the thread
    signal: Option<Sender<()>>,
    /// Background thread handle
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the background thread
    ///
    /// `tick` runs every `interval` unless the timer is reset first. Tick
    /// failures are logged and retried on the next interval.
    pub fn start<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        // One pending reset is enough; extra resets collapse into it
        let (signal_tx, signal_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match signal_rx.recv_timeout(interval) {
                    Ok(()) => continue,
                    Err(RecvTimeoutError::Timeout) => {
                        if let Err(e) = tick() {
                            tracing::warn!("Background WAL sync failed: {}", e);
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Started WAL sync scheduler");

        Ok(Self {
            signal: Some(signal_tx),
            handle: Some(handle),
        })
    }

    /// Restart the interval from now
    pub fn reset(&self) {
        if let Some(signal) = &self.signal {
            // Full means a reset is already pending
            let _ = signal.try_send(());
        }
    }

    /// Signal shutdown and wait for the thread to exit
    ///
    /// A tick already in progress runs to completion. Calling `stop` twice
    /// is a no-op.
    pub fn stop(&mut self) {
        drop(self.signal.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("WAL sync scheduler thread panicked");
            }
        }
    }

    /// True until `stop` has been called
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
