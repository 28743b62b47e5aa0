//! Adapter trait for the virtual controller driver.

use async_trait::async_trait;

use super::{ButtonId, OutputAxis};
use crate::error::DriverError;

/// Anything that can receive axis and button writes.
///
/// Implementations should return quickly; the caller bounds every frame with
/// a timeout and treats failures as recoverable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutputSink: Send {
    /// Set one axis to a value in the driver's device range.
    async fn set_axis(&mut self, axis: OutputAxis, value: f32) -> Result<(), DriverError>;

    /// Set one button.
    async fn set_button(&mut self, id: ButtonId, pressed: bool) -> Result<(), DriverError>;

    /// Whether the driver is currently accepting writes.
    fn is_available(&self) -> bool;

    /// Flush and close the driver. Called once, after the final neutral frame.
    async fn release(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

