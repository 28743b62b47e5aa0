//! # Channel Registry
//!
//! The live channel table built from a [`Profile`]. Construction validates
//! the whole document first, so a registry either exists in full or not at
//! all; activation is a swap of the complete table.
//!
//! ## Malformed Profiles
//!
//! Rejected with a [`ProfileError`]:
//! - two channels bound to the same output axis
//! - a non-finite deadzone, sensitivity or safety timeout
//! - an empty channel id
//! - a button key that is not a number in `1..=128`
//! - a safety timeout that is not strictly positive
//!
//! Finite but out-of-range percentages are clamped with a warning instead.

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{Profile, SafetyConfig};
use crate::error::ProfileError;
use crate::output::{ButtonId, DeviceRange, Frame, OutputAxis};
use crate::safety::SafetySettings;
use crate::shaping::{shape, AxisRange, ButtonChannel, ButtonMode, CurveParams};

/// Live state of one axis channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisChannel {
    id: String,
    params: CurveParams,
    binding: OutputAxis,
    smoothing: bool,
    raw: f32,
    target: f32,
    emitted: f32,
}

impl AxisChannel {
    fn new(id: String, params: CurveParams, binding: OutputAxis, smoothing: bool) -> Self {
        let neutral = params.range.neutral();
        Self {
            id,
            params,
            binding,
            smoothing,
            raw: neutral,
            target: neutral,
            emitted: neutral,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    #[must_use]
    pub fn binding(&self) -> OutputAxis {
        self.binding
    }

    #[must_use]
    pub fn range(&self) -> AxisRange {
        self.params.range
    }

    #[must_use]
    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Last accepted raw sample.
    #[must_use]
    pub fn raw(&self) -> f32 {
        self.raw
    }

    /// Shaped value the channel is moving toward.
    #[must_use]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Value sent on the last tick.
    #[must_use]
    pub fn emitted(&self) -> f32 {
        self.emitted
    }

    /// Stores a raw sample and reshapes the target.
    ///
    /// Out-of-range samples are clamped to the channel range.
    pub fn set_raw(&mut self, raw: f32) {
        self.raw = self.params.range.clamp(raw);
        self.target = shape(self.raw, &self.params);
    }

    pub fn set_emitted(&mut self, value: f32) {
        self.emitted = self.params.range.clamp(value);
    }

    /// Returns raw, target and emitted to neutral.
    pub fn reset(&mut self) {
        let neutral = self.params.range.neutral();
        self.raw = neutral;
        self.target = neutral;
        self.emitted = neutral;
    }
}

/// Validated channel table for the active profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRegistry {
    name: String,
    axes: BTreeMap<String, AxisChannel>,
    buttons: BTreeMap<ButtonId, ButtonChannel>,
    safety: SafetySettings,
}

impl ChannelRegistry {
    /// Validates `profile` and builds a fresh table with every channel at
    /// neutral.
    ///
    /// # Arguments
    ///
    /// * `profile` - Profile document to activate
    /// * `default_safety` - Used when the profile has no safety section
    ///
    /// # Errors
    ///
    /// Returns the first [`ProfileError`] found; nothing is built in that case.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::profile::{ChannelRegistry, Profile};
    /// use nimbus_bridge::safety::SafetySettings;
    ///
    /// let registry = ChannelRegistry::from_profile(&Profile::default_layout(), SafetySettings::default())?;
    /// assert_eq!(registry.axis("left_x").map(|c| c.emitted()), Some(0.0));
    /// # Ok::<(), nimbus_bridge::error::ProfileError>(())
    /// ```
    pub fn from_profile(profile: &Profile, default_safety: SafetySettings) -> Result<Self, ProfileError> {
        let safety = match profile.safety {
            Some(section) => safety_settings(section)?,
            None => default_safety,
        };

        let mut bound: BTreeMap<OutputAxis, &str> = BTreeMap::new();
        let mut axes = BTreeMap::new();
        for (id, config) in &profile.axis_channels {
            if id.trim().is_empty() {
                return Err(ProfileError::InvalidChannelId(id.clone()));
            }

            for (field, value) in [
                ("deadzone", config.deadzone),
                ("extremityDeadzone", config.extremity_deadzone),
                ("sensitivity", config.sensitivity),
            ] {
                if !value.is_finite() {
                    return Err(ProfileError::NonFinite {
                        channel: id.clone(),
                        field,
                    });
                }
            }

            if let Some(first) = bound.insert(config.output_axis_binding, id) {
                return Err(ProfileError::DuplicateBinding {
                    axis: config.output_axis_binding.to_string(),
                    first: first.to_string(),
                    second: id.clone(),
                });
            }

            let params = config.curve_params().sanitized(id);
            axes.insert(
                id.clone(),
                AxisChannel::new(id.clone(), params, config.output_axis_binding, config.smoothing),
            );
        }

        let mut buttons = BTreeMap::new();
        for (key, config) in &profile.button_channels {
            let id: ButtonId = key.parse()?;
            buttons.insert(id, ButtonChannel::new(id, config.mode));
        }

        debug!(
            "Validated profile '{}': {} axes, {} buttons",
            profile.display_name(),
            axes.len(),
            buttons.len()
        );

        Ok(Self {
            name: profile.display_name().to_string(),
            axes,
            buttons,
            safety,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn safety(&self) -> SafetySettings {
        self.safety
    }

    #[must_use]
    pub fn axis(&self, id: &str) -> Option<&AxisChannel> {
        self.axes.get(id)
    }

    pub fn axis_mut(&mut self, id: &str) -> Option<&mut AxisChannel> {
        self.axes.get_mut(id)
    }

    /// Axis channels in channel-id order.
    pub fn axes(&self) -> impl Iterator<Item = &AxisChannel> {
        self.axes.values()
    }

    pub fn axes_mut(&mut self) -> impl Iterator<Item = &mut AxisChannel> {
        self.axes.values_mut()
    }

    #[must_use]
    pub fn button(&self, id: ButtonId) -> Option<&ButtonChannel> {
        self.buttons.get(&id)
    }

    pub fn button_mut(&mut self, id: ButtonId) -> Option<&mut ButtonChannel> {
        self.buttons.get_mut(&id)
    }

    /// Button channels in ascending id order.
    pub fn buttons(&self) -> impl Iterator<Item = &ButtonChannel> {
        self.buttons.values()
    }

    pub fn buttons_mut(&mut self) -> impl Iterator<Item = &mut ButtonChannel> {
        self.buttons.values_mut()
    }

    /// Returns the button, adding it released in `mode` if the profile did
    /// not define it.
    pub fn button_entry(&mut self, id: ButtonId, mode: ButtonMode) -> &mut ButtonChannel {
        self.buttons
            .entry(id)
            .or_insert_with(|| ButtonChannel::new(id, mode))
    }

    /// Every channel at rest, scaled into `device`.
    #[must_use]
    pub fn neutral_frame(&self, device: &DeviceRange) -> Frame {
        Frame {
            axes: self
                .axes()
                .map(|c| (c.binding(), device.neutral(c.range())))
                .collect(),
            buttons: self.buttons().map(|b| (b.id(), false)).collect(),
        }
    }
}

fn safety_settings(section: SafetyConfig) -> Result<SafetySettings, ProfileError> {
    let seconds = section.timeout_seconds;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(ProfileError::InvalidSafetyTimeout(seconds));
    }
    Ok(SafetySettings {
        enabled: section.enabled,
        timeout: Duration::from_secs_f64(seconds),
    })
}
