//! # Sink Writer
//!
//! Pushes tick frames into an [`OutputSink`] while keeping the scheduler
//! independent of driver health.
//!
//! - Only values that differ from the last successful write are sent.
//! - Every frame is bounded by a timeout.
//! - Any failure drops the cache, so the next successful frame resends the
//!   complete state (resync).
//! - While the driver is unavailable, frames are skipped; the caller keeps
//!   computing state so nothing is lost when the driver returns.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ButtonId, Frame, OutputAxis, OutputSink, SinkWrite};
use crate::error::DriverError;

/// Default bound on a single frame write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(20);

/// Change-only, timeout-bounded frame writer.
pub struct SinkWriter {
    sink: Box<dyn OutputSink>,
    timeout: Duration,
    last_axes: BTreeMap<OutputAxis, f32>,
    last_buttons: BTreeMap<ButtonId, bool>,
    connected: bool,
    frames_written: u64,
    failures: u64,
}

impl std::fmt::Debug for SinkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkWriter")
            .field("timeout", &self.timeout)
            .field("connected", &self.connected)
            .field("frames_written", &self.frames_written)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl SinkWriter {
    #[must_use]
    pub fn new(sink: Box<dyn OutputSink>, timeout: Duration) -> Self {
        Self {
            sink,
            timeout,
            last_axes: BTreeMap::new(),
            last_buttons: BTreeMap::new(),
            connected: false,
            frames_written: 0,
            failures: 0,
        }
    }

    /// Whether the last frame reached the driver.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Writes the parts of `frame` that changed since the last success.
    ///
    /// # Returns
    ///
    /// Number of individual writes sent.
    ///
    /// # Errors
    ///
    /// [`DriverError::Unavailable`] if the sink is not accepting writes,
    /// [`DriverError::Timeout`] if the frame did not finish in time, or the
    /// sink's own error. All of them are recoverable.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<usize, DriverError> {
        if !self.sink.is_available() {
            self.mark_failed(&DriverError::Unavailable);
            return Err(DriverError::Unavailable);
        }

        let pending: Vec<SinkWrite> = frame
            .writes()
            .filter(|write| self.is_changed(write))
            .collect();

        let timeout = self.timeout;
        let result = match tokio::time::timeout(timeout, self.send(&pending)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(timeout.as_millis() as u64)),
        };

        match result {
            Ok(()) => {
                if !self.connected {
                    info!("Driver connected");
                    self.connected = true;
                }
                self.frames_written += 1;
                Ok(pending.len())
            }
            Err(e) => {
                self.mark_failed(&e);
                Err(e)
            }
        }
    }

    /// Writes `frame` in full, then releases the sink.
    ///
    /// Used once on shutdown with an all-neutral frame.
    ///
    /// # Errors
    ///
    /// Returns the first error from the final frame or the release.
    pub async fn finish(&mut self, frame: &Frame) -> Result<(), DriverError> {
        self.invalidate();
        let written = self.write_frame(frame).await.map(|_| ());

        let timeout = self.timeout;
        let released = match tokio::time::timeout(timeout, self.sink.release()).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(timeout.as_millis() as u64)),
        };
        if let Err(ref e) = released {
            warn!("Driver release failed: {}", e);
        }
        self.connected = false;

        written.and(released)
    }

    /// Forgets what was written; the next frame is sent in full.
    pub fn invalidate(&mut self) {
        self.last_axes.clear();
        self.last_buttons.clear();
    }

    fn is_changed(&self, write: &SinkWrite) -> bool {
        match *write {
            SinkWrite::Axis { axis, value } => self.last_axes.get(&axis) != Some(&value),
            SinkWrite::Button { button, pressed } => self.last_buttons.get(&button) != Some(&pressed),
        }
    }

    async fn send(&mut self, pending: &[SinkWrite]) -> Result<(), DriverError> {
        for write in pending {
            match *write {
                SinkWrite::Axis { axis, value } => {
                    self.sink.set_axis(axis, value).await?;
                    self.last_axes.insert(axis, value);
                }
                SinkWrite::Button { button, pressed } => {
                    self.sink.set_button(button, pressed).await?;
                    self.last_buttons.insert(button, pressed);
                }
            }
        }
        Ok(())
    }

    fn mark_failed(&mut self, error: &DriverError) {
        self.failures += 1;
        self.invalidate();
        if self.connected {
            warn!("Driver disconnected: {}", error);
            self.connected = false;
        } else {
            debug!("Driver write skipped: {}", error);
        }
    }
}
