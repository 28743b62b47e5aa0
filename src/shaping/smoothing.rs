//! # Smoothing Scheduler
//!
//! Moves each axis's emitted value toward its shaped target by a bounded step
//! per tick, decoupling bursty pointer input from the fixed-rate output.
//!
//! The step is recomputed from the real time since the previous tick but is
//! never larger than the nominal per-tick maximum, so a stalled scheduler does
//! not catch up with a visible jump.

use std::time::{Duration, Instant};

/// Bound on how far an emitted value may move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewLimit {
    /// Largest change in a single tick, in normalized units.
    pub max_step_per_tick: f32,
    /// Largest change per second of elapsed time.
    pub max_rate_per_second: f32,
    /// Tick period the limit was derived for.
    pub nominal_period: Duration,
}

impl SlewLimit {
    /// Derives a limit from a smoothing factor.
    ///
    /// # Arguments
    ///
    /// * `smoothing_factor` - Fraction of unit scale allowed per tick (0.0 to 1.0)
    /// * `update_rate_hz` - Scheduler tick rate
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::shaping::smoothing::SlewLimit;
    ///
    /// let limit = SlewLimit::from_factor(0.1, 60);
    /// assert!((limit.max_step_per_tick - 0.1).abs() < 1e-6);
    /// assert!((limit.max_rate_per_second - 6.0).abs() < 1e-4);
    /// ```
    #[must_use]
    pub fn from_factor(smoothing_factor: f32, update_rate_hz: u32) -> Self {
        let hz = update_rate_hz.max(1);
        let step = if smoothing_factor.is_finite() {
            smoothing_factor.clamp(f32::EPSILON, 1.0)
        } else {
            1.0
        };
        Self {
            max_step_per_tick: step,
            max_rate_per_second: step * hz as f32,
            nominal_period: Duration::from_secs_f64(1.0 / f64::from(hz)),
        }
    }

    /// A limit that never restricts movement.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_step_per_tick: f32::MAX,
            max_rate_per_second: f32::MAX,
            nominal_period: Duration::from_millis(16),
        }
    }

    /// Largest allowed change for a tick that covered `elapsed` time.
    #[inline]
    #[must_use]
    pub fn max_step(&self, elapsed: Duration) -> f32 {
        (self.max_rate_per_second * elapsed.as_secs_f32()).min(self.max_step_per_tick)
    }
}

/// Moves `emitted` toward `target` by at most `max_step`.
///
/// # Examples
///
/// ```
/// use nimbus_bridge::shaping::smoothing::slew_toward;
///
/// assert!((slew_toward(0.0, 1.0, 0.25) - 0.25).abs() < 1e-6);
/// assert!((slew_toward(0.9, 1.0, 0.25) - 1.0).abs() < 1e-6);
/// assert!((slew_toward(0.0, -1.0, 0.25) + 0.25).abs() < 1e-6);
/// ```
#[inline]
#[must_use]
pub fn slew_toward(emitted: f32, target: f32, max_step: f32) -> f32 {
    let change = (target - emitted).clamp(-max_step, max_step);
    emitted + change
}

/// Per-tick smoothing driver shared by every axis channel.
#[derive(Debug, Clone)]
pub struct SmoothingScheduler {
    limit: SlewLimit,
    enabled: bool,
    last_tick: Option<Instant>,
}

impl SmoothingScheduler {
    /// Creates a scheduler; `enabled = false` makes every channel snap to target.
    #[must_use]
    pub fn new(limit: SlewLimit, enabled: bool) -> Self {
        Self {
            limit,
            enabled,
            last_tick: None,
        }
    }

    #[must_use]
    pub fn limit(&self) -> SlewLimit {
        self.limit
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Records a tick at `now` and returns the time it covers.
    ///
    /// The first tick, and any tick after a stall, covers at most one nominal
    /// period.
    pub fn begin_tick(&mut self, now: Instant) -> Duration {
        let elapsed = match self.last_tick {
            Some(last) => now.saturating_duration_since(last),
            None => self.limit.nominal_period,
        };
        self.last_tick = Some(now);
        elapsed.min(self.limit.nominal_period)
    }

    /// Computes the next emitted value for one channel.
    ///
    /// # Arguments
    ///
    /// * `emitted` - Value sent on the previous tick
    /// * `target` - Latest shaped value
    /// * `channel_smoothing` - Per-channel smoothing switch
    /// * `elapsed` - Duration returned by [`SmoothingScheduler::begin_tick`]
    #[must_use]
    pub fn advance(&self, emitted: f32, target: f32, channel_smoothing: bool, elapsed: Duration) -> f32 {
        if !self.enabled || !channel_smoothing {
            return target;
        }
        slew_toward(emitted, target, self.limit.max_step(elapsed))
    }

    /// Forgets the previous tick time (used after a profile switch).
    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> SmoothingScheduler {
        SmoothingScheduler::new(SlewLimit::from_factor(0.1, 60), true)
    }

    // ==================== SlewLimit Tests ====================

    #[test]
    fn test_from_factor_clamps_range() {
        assert_eq!(SlewLimit::from_factor(5.0, 60).max_step_per_tick, 1.0);
        assert!(SlewLimit::from_factor(0.0, 60).max_step_per_tick > 0.0);
        assert_eq!(SlewLimit::from_factor(f32::NAN, 60).max_step_per_tick, 1.0);
    }

    #[test]
    fn test_max_step_capped_after_stall() {
        let limit = SlewLimit::from_factor(0.1, 60);
        assert!(limit.max_step(Duration::from_secs(10)) <= 0.1);
    }

    #[test]
    fn test_max_step_scales_with_short_tick() {
        let limit = SlewLimit::from_factor(0.1, 60);
        let half = limit.max_step(limit.nominal_period / 2);
        assert!((half - 0.05).abs() < 1e-3);
    }

    // ==================== Slew Tests ====================

    #[test]
    fn test_step_response() {
        let s = scheduler();
        let next = s.advance(0.0, 1.0, true, s.limit().nominal_period);
        assert!((next - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_convergence() {
        let s = scheduler();
        let mut emitted = 0.0;
        for _ in 0..20 {
            emitted = s.advance(emitted, -1.0, true, s.limit().nominal_period);
        }
        assert!((emitted + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_no_overshoot() {
        let s = scheduler();
        let next = s.advance(0.95, 1.0, true, s.limit().nominal_period);
        assert_eq!(next, 1.0);
    }

    #[test]
    fn test_disabled_snaps_to_target() {
        let s = SmoothingScheduler::new(SlewLimit::from_factor(0.1, 60), false);
        assert_eq!(s.advance(-1.0, 1.0, true, Duration::ZERO), 1.0);
    }

    #[test]
    fn test_channel_opt_out_snaps_to_target() {
        let s = scheduler();
        assert_eq!(s.advance(-1.0, 1.0, false, s.limit().nominal_period), 1.0);
    }

    #[test]
    fn test_unlimited_is_bypass() {
        let s = SmoothingScheduler::new(SlewLimit::unlimited(), true);
        assert_eq!(s.advance(0.0, 0.8, true, Duration::from_millis(16)), 0.8);
    }

    // ==================== Tick Timing Tests ====================

    #[test]
    fn test_first_tick_covers_nominal_period() {
        let mut s = scheduler();
        let elapsed = s.begin_tick(Instant::now());
        assert_eq!(elapsed, s.limit().nominal_period);
    }

    #[test]
    fn test_stalled_tick_is_capped() {
        let mut s = scheduler();
        let start = Instant::now();
        s.begin_tick(start);
        let elapsed = s.begin_tick(start + Duration::from_secs(3));
        assert_eq!(elapsed, s.limit().nominal_period);
    }

    #[test]
    fn test_reset_forgets_last_tick() {
        let mut s = scheduler();
        let start = Instant::now();
        s.begin_tick(start);
        s.reset();
        assert_eq!(s.begin_tick(start), s.limit().nominal_period);
    }
}
