//! # Output Module
//!
//! The narrow boundary between the shaping pipeline and the virtual
//! controller driver.
//!
//! This module handles:
//! - Identifiers for driver axes and buttons
//! - Mapping normalized values into the driver's axis range
//! - The [`OutputSink`] adapter trait and its implementations
//! - Change-only frame writes with a bounded timeout ([`SinkWriter`])

pub mod jsonl;
pub mod memory;
pub mod sink;
pub mod writer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProfileError;
use crate::shaping::AxisRange;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use sink::OutputSink;
pub use writer::SinkWriter;

/// Highest button number the driver exposes.
pub const MAX_BUTTON_ID: u8 = 128;

/// Default driver axis minimum (vJoy).
pub const DEFAULT_AXIS_MIN: i32 = 0;

/// Default driver axis maximum (vJoy).
pub const DEFAULT_AXIS_MAX: i32 = 32767;

/// Physical axis slots offered by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputAxis {
    X,
    Y,
    Z,
    Rx,
    Ry,
    Rz,
    Sl0,
    Sl1,
}

impl OutputAxis {
    /// Every axis slot, in driver order.
    pub const ALL: [OutputAxis; 8] = [
        OutputAxis::X,
        OutputAxis::Y,
        OutputAxis::Z,
        OutputAxis::Rx,
        OutputAxis::Ry,
        OutputAxis::Rz,
        OutputAxis::Sl0,
        OutputAxis::Sl1,
    ];

    /// Lowercase name used in profiles and sink output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutputAxis::X => "x",
            OutputAxis::Y => "y",
            OutputAxis::Z => "z",
            OutputAxis::Rx => "rx",
            OutputAxis::Ry => "ry",
            OutputAxis::Rz => "rz",
            OutputAxis::Sl0 => "sl0",
            OutputAxis::Sl1 => "sl1",
        }
    }
}

impl fmt::Display for OutputAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver button number, always in `1..=128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ButtonId(u8);

impl ButtonId {
    /// Returns `None` for 0 or anything above [`MAX_BUTTON_ID`].
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::output::ButtonId;
    ///
    /// assert!(ButtonId::new(1).is_some());
    /// assert!(ButtonId::new(0).is_none());
    /// assert!(ButtonId::new(129).is_none());
    /// ```
    #[must_use]
    pub fn new(id: u8) -> Option<Self> {
        (1..=MAX_BUTTON_ID).contains(&id).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ButtonId {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(ButtonId::new)
            .ok_or_else(|| ProfileError::InvalidButtonId(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for ButtonId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u8::deserialize(deserializer)?;
        ButtonId::new(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("button id {} out of range 1-{}", raw, MAX_BUTTON_ID))
        })
    }
}

/// Integer span of the driver's axis values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRange {
    pub min: i32,
    pub max: i32,
}

impl Default for DeviceRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_AXIS_MIN,
            max: DEFAULT_AXIS_MAX,
        }
    }
}

impl DeviceRange {
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Maps a normalized value into the device range.
    ///
    /// Bipolar center lands on the midpoint; unipolar zero lands on `min`.
    /// The input is clamped first so the result never leaves the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::output::DeviceRange;
    /// use nimbus_bridge::shaping::AxisRange;
    ///
    /// let range = DeviceRange::new(0, 32767);
    /// assert_eq!(range.scale(-1.0, AxisRange::Bipolar), 0.0);
    /// assert_eq!(range.scale(1.0, AxisRange::Bipolar), 32767.0);
    /// assert_eq!(range.scale(0.0, AxisRange::Unipolar), 0.0);
    /// ```
    #[must_use]
    pub fn scale(&self, value: f32, range: AxisRange) -> f32 {
        // Widened so the full i32 range cannot overflow
        let span = (i64::from(self.max) - i64::from(self.min)) as f32;
        let fraction = match range {
            AxisRange::Bipolar => (range.clamp(value) + 1.0) / 2.0,
            AxisRange::Unipolar => range.clamp(value),
        };
        self.min as f32 + fraction * span
    }

    /// Device value for a channel at rest.
    #[must_use]
    pub fn neutral(&self, range: AxisRange) -> f32 {
        self.scale(range.neutral(), range)
    }
}

/// One value pushed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SinkWrite {
    Axis { axis: OutputAxis, value: f32 },
    Button { button: ButtonId, pressed: bool },
}

/// Full output state produced by one scheduler tick, in stable order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Axis slot and device-range value.
    pub axes: Vec<(OutputAxis, f32)>,
    /// Button number and pressed state.
    pub buttons: Vec<(ButtonId, bool)>,
}

impl Frame {
    #[must_use]
    pub fn axis(&self, axis: OutputAxis) -> Option<f32> {
        self.axes.iter().find(|(a, _)| *a == axis).map(|(_, v)| *v)
    }

    #[must_use]
    pub fn button(&self, id: ButtonId) -> Option<bool> {
        self.buttons.iter().find(|(b, _)| *b == id).map(|(_, p)| *p)
    }

    /// Flattens the frame into individual writes, axes first.
    pub fn writes(&self) -> impl Iterator<Item = SinkWrite> + '_ {
        self.axes
            .iter()
            .map(|&(axis, value)| SinkWrite::Axis { axis, value })
            .chain(
                self.buttons
                    .iter()
                    .map(|&(button, pressed)| SinkWrite::Button { button, pressed }),
            )
    }
}
