//! # Failsafe Monitor
//!
//! Forces every axis to neutral and every button off when input goes stale,
//! or while an emergency stop is held.
//!
//! ```text
//!            no input for > timeout
//!   Armed ----------------------------> Tripped(StaleInput)
//!     ^                                       |
//!     +------------ fresh input --------------+
//!
//!   any state --- emergency stop on ---> Tripped(EmergencyStop)
//!   Tripped(EmergencyStop) --- emergency stop off ---> Armed
//! ```
//!
//! Recovery from a stale-input trip is automatic. An emergency stop stays in
//! force until it is explicitly cleared, even if input keeps arriving.

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Failsafe parameters taken from the active profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetySettings {
    /// Whether the stale-input timeout is enforced.
    pub enabled: bool,
    /// Maximum time without fresh input.
    pub timeout: Duration,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Why the failsafe is holding outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripReason {
    StaleInput,
    EmergencyStop,
}

/// Overall failsafe state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailsafeState {
    Armed,
    Tripped(TripReason),
}

/// Tracks input freshness and the emergency stop.
#[derive(Debug, Clone)]
pub struct FailsafeMonitor {
    settings: SafetySettings,
    last_fresh_input_at: Instant,
    timed_out: bool,
    emergency_stop: bool,
}

impl FailsafeMonitor {
    /// Creates an armed monitor whose timeout window starts at `now`.
    #[must_use]
    pub fn new(settings: SafetySettings, now: Instant) -> Self {
        Self {
            settings,
            last_fresh_input_at: now,
            timed_out: false,
            emergency_stop: false,
        }
    }

    #[must_use]
    pub fn settings(&self) -> SafetySettings {
        self.settings
    }

    #[must_use]
    pub fn last_fresh_input_at(&self) -> Instant {
        self.last_fresh_input_at
    }

    #[must_use]
    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    /// True while outputs must be held at neutral.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.timed_out || self.emergency_stop
    }

    #[must_use]
    pub fn state(&self) -> FailsafeState {
        if self.emergency_stop {
            FailsafeState::Tripped(TripReason::EmergencyStop)
        } else if self.timed_out {
            FailsafeState::Tripped(TripReason::StaleInput)
        } else {
            FailsafeState::Armed
        }
    }

    /// Replaces the settings and restarts the timeout window at `now`.
    ///
    /// A stale-input trip is cleared; an emergency stop is kept.
    pub fn reconfigure(&mut self, settings: SafetySettings, now: Instant) {
        self.settings = settings;
        self.last_fresh_input_at = now;
        self.timed_out = false;
    }

    /// Notes fresh input at `now`.
    ///
    /// # Returns
    ///
    /// `true` if this cleared a stale-input trip.
    pub fn record_input(&mut self, now: Instant) -> bool {
        self.last_fresh_input_at = now;
        if self.timed_out {
            self.timed_out = false;
            info!("Failsafe cleared: input resumed");
            return true;
        }
        false
    }

    /// Checks the timeout at tick time.
    ///
    /// # Returns
    ///
    /// `true` if this call tripped the failsafe.
    pub fn evaluate(&mut self, now: Instant) -> bool {
        if !self.settings.enabled || self.timed_out {
            return false;
        }
        let idle = now.saturating_duration_since(self.last_fresh_input_at);
        if idle > self.settings.timeout {
            self.timed_out = true;
            warn!(
                "Failsafe tripped: no input for {:.2}s (timeout {:.2}s)",
                idle.as_secs_f64(),
                self.settings.timeout.as_secs_f64()
            );
            return true;
        }
        false
    }

    /// Engages or clears the emergency stop.
    ///
    /// # Returns
    ///
    /// `true` if the emergency stop state changed.
    pub fn set_emergency_stop(&mut self, engaged: bool) -> bool {
        if self.emergency_stop == engaged {
            return false;
        }
        self.emergency_stop = engaged;
        if engaged {
            warn!("Emergency stop engaged");
        } else {
            info!("Emergency stop cleared");
        }
        true
    }
}
