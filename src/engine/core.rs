//! # Bridge Core
//!
//! The synchronous heart of the pipeline. Every input and every tick goes
//! through `&mut BridgeCore`, so a tick never sees a half-applied update.
//! Time is passed in explicitly, which keeps the core deterministic for a
//! given input trace.
//!
//! ## Per-Tick Order
//!
//! 1. Evaluate the failsafe timeout.
//! 2. If tripped, emit the neutral frame.
//! 3. Otherwise slew every axis toward its target (channel-id order).
//! 4. Report every bound axis and every button.

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ProfileError;
use crate::output::{ButtonId, DeviceRange, Frame};
use crate::profile::{ChannelRegistry, Profile};
use crate::safety::{FailsafeMonitor, FailsafeState, SafetySettings};
use crate::shaping::{ButtonMode, SlewLimit, SmoothingScheduler};

/// Fixed settings for the lifetime of a core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreSettings {
    pub slew: SlewLimit,
    pub smoothing_enabled: bool,
    pub device_range: DeviceRange,
    pub default_safety: SafetySettings,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            slew: SlewLimit::from_factor(0.1, 60),
            smoothing_enabled: true,
            device_range: DeviceRange::default(),
            default_safety: SafetySettings::default(),
        }
    }
}

/// Channel table, smoothing and failsafe for the active profile.
#[derive(Debug, Clone)]
pub struct BridgeCore {
    registry: ChannelRegistry,
    smoothing: SmoothingScheduler,
    failsafe: FailsafeMonitor,
    settings: CoreSettings,
    ticks: u64,
}

impl BridgeCore {
    /// Builds a core with `profile` active.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if the profile is malformed.
    pub fn new(profile: &Profile, settings: CoreSettings, now: Instant) -> Result<Self, ProfileError> {
        let registry = ChannelRegistry::from_profile(profile, settings.default_safety)?;
        let failsafe = FailsafeMonitor::new(registry.safety(), now);
        info!(
            "Profile '{}' active ({} axes, {} buttons)",
            registry.name(),
            registry.axes().count(),
            registry.buttons().count()
        );
        Ok(Self {
            registry,
            smoothing: SmoothingScheduler::new(settings.slew, settings.smoothing_enabled),
            failsafe,
            settings,
            ticks: 0,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    #[must_use]
    pub fn profile_name(&self) -> &str {
        self.registry.name()
    }

    #[must_use]
    pub fn failsafe_state(&self) -> FailsafeState {
        self.failsafe.state()
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.failsafe.is_tripped()
    }

    #[must_use]
    pub fn emergency_stop(&self) -> bool {
        self.failsafe.emergency_stop()
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Normalized value emitted on the last tick.
    #[must_use]
    pub fn emitted(&self, channel: &str) -> Option<f32> {
        self.registry.axis(channel).map(|c| c.emitted())
    }

    /// Latest shaped target.
    #[must_use]
    pub fn target(&self, channel: &str) -> Option<f32> {
        self.registry.axis(channel).map(|c| c.target())
    }

    /// Button state as reported to the driver, including the failsafe.
    #[must_use]
    pub fn button_output(&self, id: ButtonId) -> Option<bool> {
        self.registry
            .button(id)
            .map(|b| b.output() && !self.failsafe.is_tripped())
    }

    /// Ingests a normalized raw sample.
    ///
    /// # Returns
    ///
    /// `true` if the sample was accepted and counted as fresh input.
    /// Unknown channels and non-finite values are dropped.
    pub fn on_raw_axis_sample(&mut self, channel: &str, value: f32, now: Instant) -> bool {
        if !value.is_finite() {
            warn!("Dropping non-finite sample for channel '{}'", channel);
            return false;
        }
        let Some(axis) = self.registry.axis_mut(channel) else {
            debug!("Sample for unknown channel '{}' ignored", channel);
            return false;
        };
        axis.set_raw(value);
        self.failsafe.record_input(now);
        true
    }

    /// Ingests a raw button state.
    ///
    /// # Returns
    ///
    /// `true` if the button is known and the event counted as fresh input.
    pub fn on_raw_button_edge(&mut self, id: ButtonId, pressed: bool, now: Instant) -> bool {
        let Some(button) = self.registry.button_mut(id) else {
            debug!("Edge for unknown button {} ignored", id);
            return false;
        };
        if let Some(output) = button.on_edge(pressed) {
            debug!("Button {} -> {}", id, output);
        }
        self.failsafe.record_input(now);
        true
    }

    /// Atomically replaces the active profile.
    ///
    /// The new profile is fully validated before anything changes. On success
    /// every channel starts at neutral, and the returned frame centers and
    /// releases everything the previous profile had bound.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] and leaves the previous profile and all
    /// live values untouched.
    pub fn activate_profile(&mut self, profile: &Profile, now: Instant) -> Result<Frame, ProfileError> {
        let next = match ChannelRegistry::from_profile(profile, self.settings.default_safety) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(
                    "Profile '{}' rejected, keeping '{}': {}",
                    profile.display_name(),
                    self.registry.name(),
                    e
                );
                return Err(e);
            }
        };

        let release = self.registry.neutral_frame(&self.settings.device_range);
        let previous = std::mem::replace(&mut self.registry, next);
        self.smoothing.reset();
        self.failsafe.reconfigure(self.registry.safety(), now);

        info!(
            "Profile '{}' active (was '{}')",
            self.registry.name(),
            previous.name()
        );
        Ok(release)
    }

    /// Engages or clears the emergency stop.
    ///
    /// Engaging takes effect immediately: targets, emitted values and button
    /// states are reset, so nothing jumps back when the stop is cleared.
    ///
    /// # Returns
    ///
    /// `true` if the state changed.
    pub fn set_emergency_stop(&mut self, engaged: bool) -> bool {
        let changed = self.failsafe.set_emergency_stop(engaged);
        if changed && engaged {
            self.force_neutral();
        }
        changed
    }

    /// Changes a button's mode, adding the button if the profile lacks it.
    ///
    /// # Returns
    ///
    /// `true` if the button's output was forced off by the change.
    pub fn set_button_mode(&mut self, id: ButtonId, mode: ButtonMode) -> bool {
        let button = self.registry.button_entry(id, mode);
        button.set_mode(mode).is_some()
    }

    /// Advances one scheduler tick and returns the frame to write.
    pub fn tick(&mut self, now: Instant) -> Frame {
        self.ticks += 1;

        if self.failsafe.evaluate(now) {
            self.force_neutral();
        }

        let elapsed = self.smoothing.begin_tick(now);
        if self.failsafe.is_tripped() {
            return self.registry.neutral_frame(&self.settings.device_range);
        }

        for axis in self.registry.axes_mut() {
            let next = self
                .smoothing
                .advance(axis.emitted(), axis.target(), axis.smoothing(), elapsed);
            axis.set_emitted(next);
        }

        self.current_frame()
    }

    /// Frame with every channel at rest, for shutdown.
    #[must_use]
    pub fn neutral_frame(&self) -> Frame {
        self.registry.neutral_frame(&self.settings.device_range)
    }

    fn current_frame(&self) -> Frame {
        let device = &self.settings.device_range;
        Frame {
            axes: self
                .registry
                .axes()
                .map(|c| (c.binding(), device.scale(c.emitted(), c.range())))
                .collect(),
            buttons: self
                .registry
                .buttons()
                .map(|b| (b.id(), b.output()))
                .collect(),
        }
    }

    fn force_neutral(&mut self) {
        for axis in self.registry.axes_mut() {
            axis.reset();
        }
        for button in self.registry.buttons_mut() {
            button.release();
        }
    }
}
