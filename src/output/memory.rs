//! In-memory output sink.
//!
//! Used when no driver is installed (simulation mode) and by tests. Clones
//! share state, so a test can keep one handle while the engine owns another.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ButtonId, OutputAxis, OutputSink, SinkWrite};
use crate::error::DriverError;

#[derive(Debug)]
struct MemoryState {
    axes: BTreeMap<OutputAxis, f32>,
    buttons: BTreeMap<ButtonId, bool>,
    writes: Vec<SinkWrite>,
    available: bool,
    released: bool,
}

/// Records the latest driver state and every write it receives.
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                axes: BTreeMap::new(),
                buttons: BTreeMap::new(),
                writes: Vec::new(),
                available: true,
                released: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last value written to `axis`.
    #[must_use]
    pub fn axis(&self, axis: OutputAxis) -> Option<f32> {
        self.lock().axes.get(&axis).copied()
    }

    /// Last state written to `id`; unwritten buttons read as released.
    #[must_use]
    pub fn button(&self, id: ButtonId) -> bool {
        self.lock().buttons.get(&id).copied().unwrap_or(false)
    }

    /// Every write received so far, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<SinkWrite> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Simulates the driver going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Whether [`OutputSink::release`] has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.lock().released
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn set_axis(&mut self, axis: OutputAxis, value: f32) -> Result<(), DriverError> {
        let mut state = self.lock();
        if !state.available {
            return Err(DriverError::Unavailable);
        }
        state.axes.insert(axis, value);
        state.writes.push(SinkWrite::Axis { axis, value });
        Ok(())
    }

    async fn set_button(&mut self, id: ButtonId, pressed: bool) -> Result<(), DriverError> {
        let mut state = self.lock();
        if !state.available {
            return Err(DriverError::Unavailable);
        }
        state.buttons.insert(id, pressed);
        state.writes.push(SinkWrite::Button { button: id, pressed });
        Ok(())
    }

    fn is_available(&self) -> bool {
        let state = self.lock();
        state.available && !state.released
    }

    async fn release(&mut self) -> Result<(), DriverError> {
        self.lock().released = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_latest_state_and_history() {
        let mut sink = MemorySink::new();
        let b2 = ButtonId::new(2).unwrap();

        sink.set_axis(OutputAxis::X, 10.0).await.unwrap();
        sink.set_axis(OutputAxis::X, 20.0).await.unwrap();
        sink.set_button(b2, true).await.unwrap();

        assert_eq!(sink.axis(OutputAxis::X), Some(20.0));
        assert!(sink.button(b2));
        assert_eq!(sink.writes().len(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let observer = MemorySink::new();
        let mut writer = observer.clone();
        writer.set_axis(OutputAxis::Rz, 5.0).await.unwrap();
        assert_eq!(observer.axis(OutputAxis::Rz), Some(5.0));
    }

    #[tokio::test]
    async fn test_unavailable_rejects_writes() {
        let mut sink = MemorySink::new();
        sink.set_available(false);
        assert!(!sink.is_available());
        assert_eq!(
            sink.set_axis(OutputAxis::X, 1.0).await,
            Err(DriverError::Unavailable)
        );
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_release_marks_unavailable() {
        let mut sink = MemorySink::new();
        sink.release().await.unwrap();
        assert!(sink.is_released());
        assert!(!sink.is_available());
    }
}
