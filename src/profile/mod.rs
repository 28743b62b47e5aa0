//! # Profile Module
//!
//! Persisted channel configuration and its validated, live counterpart.
//!
//! This module handles:
//! - The JSON profile document ([`Profile`])
//! - Validation into a live channel table ([`ChannelRegistry`])
//! - Loading and saving profiles on disk ([`JsonProfileStore`])
//!
//! ## Document
//!
//! ```json
//! {
//!   "axisChannels": {
//!     "left_x": { "deadzone": 0.1, "extremityDeadzone": 0.05, "sensitivity": 50,
//!                 "curve": "exponential", "invert": false, "outputAxisBinding": "x" }
//!   },
//!   "buttonChannels": { "1": { "mode": "toggle" } },
//!   "safety": { "enabled": true, "timeoutSeconds": 5.0 }
//! }
//! ```
//!
//! Deadzones are fractions (0.0 to 1.0); sensitivity is a percentage.

pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProfileError;
use crate::output::OutputAxis;
use crate::shaping::{AxisRange, ButtonMode, CurveFamily, CurveParams};

pub use registry::{AxisChannel, ChannelRegistry};
pub use store::JsonProfileStore;

/// Name given to profiles that do not carry one.
pub const DEFAULT_PROFILE_NAME: &str = "default";

/// A complete, persisted channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Informational tag for the UI layer; ignored by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_kind: Option<String>,

    #[serde(default)]
    pub axis_channels: BTreeMap<String, AxisChannelConfig>,

    /// Keyed by button number as a string, as JSON object keys must be.
    #[serde(default)]
    pub button_channels: BTreeMap<String, ButtonChannelConfig>,

    /// Falls back to the application's `[safety]` settings when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<SafetyConfig>,
}

/// Configuration of one axis channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisChannelConfig {
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_extremity_deadzone")]
    pub extremity_deadzone: f32,

    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,

    #[serde(default)]
    pub curve: CurveFamily,

    #[serde(default)]
    pub invert: bool,

    pub output_axis_binding: OutputAxis,

    #[serde(default)]
    pub range: AxisRange,

    /// Per-channel slew limiting; `false` snaps straight to target.
    #[serde(default = "default_smoothing")]
    pub smoothing: bool,
}

/// Configuration of one button channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ButtonChannelConfig {
    #[serde(default)]
    pub mode: ButtonMode,
}

/// Failsafe section of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyConfig {
    #[serde(default = "default_safety_enabled")]
    pub enabled: bool,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

fn default_deadzone() -> f32 { 0.1 }
fn default_extremity_deadzone() -> f32 { 0.05 }
fn default_sensitivity() -> f32 { 50.0 }
fn default_smoothing() -> bool { true }
fn default_safety_enabled() -> bool { true }
fn default_timeout_seconds() -> f64 { 5.0 }

impl AxisChannelConfig {
    /// A bipolar channel with default shaping bound to `axis`.
    #[must_use]
    pub fn bound_to(axis: OutputAxis) -> Self {
        Self {
            deadzone: default_deadzone(),
            extremity_deadzone: default_extremity_deadzone(),
            sensitivity: default_sensitivity(),
            curve: CurveFamily::default(),
            invert: false,
            output_axis_binding: axis,
            range: AxisRange::Bipolar,
            smoothing: default_smoothing(),
        }
    }

    /// Curve parameters in percent, before clamping.
    #[must_use]
    pub fn curve_params(&self) -> CurveParams {
        CurveParams {
            sensitivity_percent: self.sensitivity,
            deadzone_percent: self.deadzone * 100.0,
            extremity_deadzone_percent: self.extremity_deadzone * 100.0,
            family: self.curve,
            invert: self.invert,
            range: self.range,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: default_safety_enabled(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Profile {
    /// An empty profile with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layout_kind: None,
            axis_channels: BTreeMap::new(),
            button_channels: BTreeMap::new(),
            safety: None,
        }
    }

    /// The stock layout: two sticks, throttle, rudder and ten buttons.
    ///
    /// Buttons 9 and 10 are the ARM and RTH buttons; all buttons start in
    /// momentary mode.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::profile::Profile;
    ///
    /// let profile = Profile::default_layout();
    /// assert_eq!(profile.axis_channels.len(), 6);
    /// assert_eq!(profile.button_channels.len(), 10);
    /// ```
    #[must_use]
    pub fn default_layout() -> Self {
        let mut profile = Self::named(DEFAULT_PROFILE_NAME);
        profile.layout_kind = Some("dual-stick".to_string());

        for (id, axis) in [
            ("left_x", OutputAxis::X),
            ("left_y", OutputAxis::Y),
            ("right_x", OutputAxis::Rx),
            ("right_y", OutputAxis::Ry),
            ("rudder", OutputAxis::Rz),
        ] {
            profile
                .axis_channels
                .insert(id.to_string(), AxisChannelConfig::bound_to(axis));
        }

        let mut throttle = AxisChannelConfig::bound_to(OutputAxis::Z);
        throttle.range = AxisRange::Unipolar;
        throttle.deadzone = 0.0;
        profile.axis_channels.insert("throttle".to_string(), throttle);

        for id in 1..=10u8 {
            profile
                .button_channels
                .insert(id.to_string(), ButtonChannelConfig::default());
        }

        profile.safety = Some(SafetyConfig::default());
        profile
    }

    /// Parses a profile document.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Parse`] if the JSON is malformed or does not
    /// match the schema.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        serde_json::from_str(json).map_err(|e| ProfileError::Parse(e.to_string()))
    }

    /// Serializes the profile as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Parse`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ProfileError> {
        serde_json::to_string_pretty(self).map_err(|e| ProfileError::Parse(e.to_string()))
    }

    /// Display name, falling back to [`DEFAULT_PROFILE_NAME`].
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_PROFILE_NAME
        } else {
            &self.name
        }
    }
}
