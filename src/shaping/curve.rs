//! # Curve Engine
//!
//! Shapes a raw normalized axis sample into a target output value.
//!
//! ## Pipeline
//!
//! 1. **Center deadzone**: `|raw| <= deadzone` maps to 0. Outside the deadzone
//!    the remaining travel is rescaled so the boundary maps to 0 and the
//!    output continues smoothly outward.
//! 2. **Extremity deadzone**: `|raw| >= 1 - extremity` maps to full scale, so
//!    the user never has to reach the literal edge of the input area.
//! 3. **Response curve**: sensitivity 50 is the identity. Lower values flatten
//!    the curve near center, higher values steepen it. The strength grows
//!    continuously with the distance from 50.
//! 4. **Invert** if configured (bipolar channels only).
//! 5. **Clamp** to `[-1, 1]` (bipolar) or `[0, 1]` (unipolar).
//!
//! ## Curve Families
//!
//! | Family | Below 50 (flatten) | Above 50 (steepen) |
//! |--------|--------------------|--------------------|
//! | `linear` | identity | identity |
//! | `exponential` | `n^p`, `p` up to 3 | `n^p`, `p` down to 1/3 |
//! | `logarithmic` | `(e^(kn) - 1) / (e^k - 1)` | `ln(1 + cn) / ln(1 + c)` |
//!
//! Every family maps 0 to 0 and 1 to 1 and is non-decreasing, so the shaped
//! output is continuous and monotonic for every legal parameter combination.
//!
//! ## Usage
//!
//! ```
//! use nimbus_bridge::shaping::curve::{shape, CurveParams};
//!
//! let params = CurveParams::linear().with_deadzone_percent(10.0);
//!
//! // Input inside the deadzone
//! assert_eq!(shape(0.05, &params), 0.0);
//!
//! // Full deflection is preserved
//! assert!((shape(1.0, &params) - 1.0).abs() < 0.001);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sensitivity that produces the identity curve.
pub const NEUTRAL_SENSITIVITY: f32 = 50.0;

/// Largest accepted deadzone or extremity deadzone, in percent.
pub const MAX_DEADZONE_PERCENT: f32 = 99.0;

/// Power-curve exponent at sensitivity 0 (its reciprocal applies at 100).
const POWER_CURVE_MAX_EXPONENT: f32 = 3.0;

/// Exp/log curve strength at sensitivity 0 and 100.
const LOG_CURVE_MAX_STRENGTH: f32 = 4.0;

/// Below this strength the exp/log family is numerically the identity.
const LOG_CURVE_MIN_STRENGTH: f32 = 1e-4;

/// Response curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveFamily {
    /// Identity after deadzones; sensitivity has no effect.
    Linear,
    /// Power curve.
    #[default]
    Exponential,
    /// Exponential below 50, logarithmic above 50.
    Logarithmic,
}

/// Output polarity of an axis channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRange {
    /// Stick-like axis in `[-1, 1]`, neutral at 0.
    #[default]
    Bipolar,
    /// Throttle-like axis in `[0, 1]`, neutral at 0.
    Unipolar,
}

impl AxisRange {
    /// Value the axis returns to on release, failsafe and shutdown.
    #[must_use]
    pub fn neutral(self) -> f32 {
        0.0
    }

    /// Lower bound of the shaped value.
    #[must_use]
    pub fn min(self) -> f32 {
        match self {
            AxisRange::Bipolar => -1.0,
            AxisRange::Unipolar => 0.0,
        }
    }

    /// Upper bound of the shaped value.
    #[must_use]
    pub fn max(self) -> f32 {
        1.0
    }

    /// Clamps a value into this range. NaN collapses to neutral.
    #[must_use]
    pub fn clamp(self, value: f32) -> f32 {
        if value.is_nan() {
            self.neutral()
        } else {
            value.clamp(self.min(), self.max())
        }
    }
}

/// Per-channel curve configuration.
///
/// All percentages are kept inside their legal ranges: values built through
/// [`CurveParams::sanitized`] are clamped and the correction is logged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams {
    /// Response curve strength, 0 to 100 (50 = linear).
    pub sensitivity_percent: f32,
    /// Center deadzone, 0 to <100.
    pub deadzone_percent: f32,
    /// Margin below full deflection that already reads as full scale.
    pub extremity_deadzone_percent: f32,
    /// Curve family used for the sensitivity mapping.
    pub family: CurveFamily,
    /// Negate the output. Unipolar channels have no opposite direction and
    /// ignore it.
    pub invert: bool,
    /// Output polarity.
    pub range: AxisRange,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            sensitivity_percent: NEUTRAL_SENSITIVITY,
            deadzone_percent: 10.0,
            extremity_deadzone_percent: 5.0,
            family: CurveFamily::Exponential,
            invert: false,
            range: AxisRange::Bipolar,
        }
    }
}

impl CurveParams {
    /// Identity parameters: no deadzones, sensitivity 50, no inversion.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_bridge::shaping::curve::{shape, CurveParams};
    ///
    /// let params = CurveParams::linear();
    /// assert!((shape(0.5, &params) - 0.5).abs() < 1e-6);
    /// ```
    #[must_use]
    pub fn linear() -> Self {
        Self {
            sensitivity_percent: NEUTRAL_SENSITIVITY,
            deadzone_percent: 0.0,
            extremity_deadzone_percent: 0.0,
            family: CurveFamily::Exponential,
            invert: false,
            range: AxisRange::Bipolar,
        }
    }

    /// Returns a copy with a different center deadzone.
    #[must_use]
    pub fn with_deadzone_percent(mut self, percent: f32) -> Self {
        self.deadzone_percent = percent;
        self
    }

    /// Returns a copy with a different extremity deadzone.
    #[must_use]
    pub fn with_extremity_percent(mut self, percent: f32) -> Self {
        self.extremity_deadzone_percent = percent;
        self
    }

    /// Returns a copy with a different sensitivity.
    #[must_use]
    pub fn with_sensitivity(mut self, percent: f32) -> Self {
        self.sensitivity_percent = percent;
        self
    }

    /// Returns a copy with a different curve family.
    #[must_use]
    pub fn with_family(mut self, family: CurveFamily) -> Self {
        self.family = family;
        self
    }

    /// Returns a copy with inversion switched on or off.
    #[must_use]
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Returns a copy with a different output polarity.
    #[must_use]
    pub fn with_range(mut self, range: AxisRange) -> Self {
        self.range = range;
        self
    }

    /// Clamps every percentage into its legal range, logging each correction.
    ///
    /// Non-finite values fall back to the defaults. A deadzone pair that
    /// leaves no travel (`deadzone + extremity >= 100`) is kept but reported;
    /// [`shape`] turns such a channel into an on/off step.
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel name used in log messages
    #[must_use]
    pub fn sanitized(self, channel: &str) -> Self {
        let defaults = CurveParams::default();
        let sensitivity_percent = clamp_percent(
            channel,
            "sensitivity",
            self.sensitivity_percent,
            defaults.sensitivity_percent,
            100.0,
        );
        let deadzone_percent = clamp_percent(
            channel,
            "deadzone",
            self.deadzone_percent,
            defaults.deadzone_percent,
            MAX_DEADZONE_PERCENT,
        );
        let extremity_deadzone_percent = clamp_percent(
            channel,
            "extremity deadzone",
            self.extremity_deadzone_percent,
            defaults.extremity_deadzone_percent,
            MAX_DEADZONE_PERCENT,
        );

        let invert = if self.invert && self.range == AxisRange::Unipolar {
            warn!("Channel '{}': invert has no effect on a unipolar channel, ignored", channel);
            false
        } else {
            self.invert
        };

        if deadzone_percent + extremity_deadzone_percent >= 100.0 {
            warn!(
                "Channel '{}': deadzone {}% + extremity {}% leaves no travel, output becomes a step",
                channel, deadzone_percent, extremity_deadzone_percent
            );
        }

        Self {
            sensitivity_percent,
            deadzone_percent,
            extremity_deadzone_percent,
            invert,
            ..self
        }
    }
}

fn clamp_percent(channel: &str, field: &str, value: f32, fallback: f32, max: f32) -> f32 {
    if !value.is_finite() {
        warn!(
            "Channel '{}': {} is not finite, using {}%",
            channel, field, fallback
        );
        return fallback;
    }
    let clamped = value.clamp(0.0, max);
    if clamped != value {
        warn!(
            "Channel '{}': {} {}% out of range, clamped to {}%",
            channel, field, value, clamped
        );
    }
    clamped
}

/// Shapes a raw normalized sample into a target value.
///
/// Pure and deterministic. NaN input yields neutral.
///
/// # Arguments
///
/// * `raw` - Raw sample, `[-1, 1]` for bipolar or `[0, 1]` for unipolar channels
/// * `params` - Channel curve parameters
///
/// # Returns
///
/// Shaped value inside `params.range`.
///
/// # Examples
///
/// ```
/// use nimbus_bridge::shaping::curve::{shape, CurveParams};
///
/// let params = CurveParams::linear()
///     .with_deadzone_percent(10.0)
///     .with_extremity_percent(10.0);
///
/// assert_eq!(shape(0.08, &params), 0.0);
/// assert_eq!(shape(0.95, &params), 1.0);
/// assert_eq!(shape(-0.95, &params), -1.0);
/// assert!((shape(0.5, &params) - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn shape(raw: f32, params: &CurveParams) -> f32 {
    if raw.is_nan() {
        return params.range.neutral();
    }

    let (sign, magnitude) = match params.range {
        AxisRange::Bipolar => {
            let clamped = raw.clamp(-1.0, 1.0);
            (if clamped < 0.0 { -1.0 } else { 1.0 }, clamped.abs())
        }
        AxisRange::Unipolar => (1.0, raw.clamp(0.0, 1.0)),
    };

    let travel = apply_deadzones(
        magnitude,
        params.deadzone_percent / 100.0,
        params.extremity_deadzone_percent / 100.0,
    );
    let curved = apply_curve(travel, params.sensitivity_percent, params.family);

    let oriented = match (params.range, params.invert) {
        (AxisRange::Bipolar, false) => sign * curved,
        (AxisRange::Bipolar, true) => -sign * curved,
        (AxisRange::Unipolar, _) => curved,
    };

    params.range.clamp(oriented)
}

/// Maps a magnitude in `0..=1` through both deadzones into `0..=1`.
#[inline]
fn apply_deadzones(magnitude: f32, deadzone: f32, extremity: f32) -> f32 {
    if magnitude <= deadzone {
        return 0.0;
    }
    let upper = 1.0 - extremity;
    if magnitude >= upper || upper <= deadzone {
        return 1.0;
    }
    ((magnitude - deadzone) / (upper - deadzone)).clamp(0.0, 1.0)
}

/// Applies the sensitivity curve to a travel fraction in `0..=1`.
#[inline]
fn apply_curve(travel: f32, sensitivity_percent: f32, family: CurveFamily) -> f32 {
    // -1.0 at sensitivity 0, 0.0 at 50, 1.0 at 100
    let bend = ((sensitivity_percent - NEUTRAL_SENSITIVITY) / NEUTRAL_SENSITIVITY).clamp(-1.0, 1.0);
    if bend == 0.0 || travel <= 0.0 || travel >= 1.0 {
        return travel;
    }

    let curved = match family {
        CurveFamily::Linear => travel,
        CurveFamily::Exponential => {
            let exponent = POWER_CURVE_MAX_EXPONENT.powf(-bend);
            travel.powf(exponent)
        }
        CurveFamily::Logarithmic => {
            let strength = LOG_CURVE_MAX_STRENGTH * bend.abs();
            if strength < LOG_CURVE_MIN_STRENGTH {
                travel
            } else if bend < 0.0 {
                (strength * travel).exp_m1() / strength.exp_m1()
            } else {
                let c = strength.exp_m1();
                (c * travel).ln_1p() / c.ln_1p()
            }
        }
    };

    curved.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-5;

    fn sweep() -> impl Iterator<Item = f32> {
        (-200..=200).map(|i| i as f32 / 200.0)
    }

    // ==================== Deadzone Tests ====================

    #[test]
    fn test_deadzone_within_zone() {
        let params = CurveParams::linear().with_deadzone_percent(10.0);
        assert_eq!(shape(0.05, &params), 0.0);
        assert_eq!(shape(-0.05, &params), 0.0);
        assert_eq!(shape(0.1, &params), 0.0);
        assert_eq!(shape(-0.1, &params), 0.0);
    }

    #[test]
    fn test_deadzone_outside_zone() {
        let params = CurveParams::linear().with_deadzone_percent(10.0);

        // Just outside deadzone
        assert!(shape(0.11, &params) > 0.0);

        // Full deflection reaches 1.0
        assert!((shape(1.0, &params) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_deadzone_scaling() {
        let params = CurveParams::linear().with_deadzone_percent(10.0);

        // Halfway between deadzone and max
        assert!((shape(0.55, &params) - 0.5).abs() < 0.001);
        assert!((shape(-0.55, &params) + 0.5).abs() < 0.001);
    }

    #[test]
    fn test_deadzone_boundary_is_continuous() {
        let params = CurveParams::linear().with_deadzone_percent(20.0);
        let just_outside = shape(0.2 + 1e-4, &params);
        assert!(just_outside > 0.0);
        assert!(just_outside < 1e-3);
    }

    // ==================== Extremity Tests ====================

    #[test]
    fn test_extremity_clamps_to_full_scale() {
        let params = CurveParams::linear().with_extremity_percent(10.0);
        assert_eq!(shape(0.91, &params), 1.0);
        assert_eq!(shape(0.97, &params), 1.0);
        assert_eq!(shape(-0.95, &params), -1.0);
    }

    #[test]
    fn test_extremity_rescales_below_margin() {
        let params = CurveParams::linear().with_extremity_percent(20.0);
        // 0.4 of the 0.8 travel
        assert!((shape(0.4, &params) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_overlapping_deadzones_collapse_to_step() {
        let params = CurveParams::linear()
            .with_deadzone_percent(60.0)
            .with_extremity_percent(50.0);

        assert_eq!(shape(0.5, &params), 0.0);
        assert_eq!(shape(0.6, &params), 0.0);
        assert_eq!(shape(0.61, &params), 1.0);
        assert_eq!(shape(-0.61, &params), -1.0);

        for x in sweep() {
            let y = shape(x, &params);
            assert!(y.is_finite());
            assert!(y == 0.0 || y.abs() == 1.0);
            assert!(y == 0.0 || y.signum() == x.signum());
        }
    }

    // ==================== Curve Tests ====================

    #[test]
    fn test_identity_at_neutral_sensitivity() {
        for family in [CurveFamily::Linear, CurveFamily::Exponential, CurveFamily::Logarithmic] {
            let params = CurveParams::linear().with_family(family);
            for x in sweep() {
                assert!((shape(x, &params) - x).abs() < TOLERANCE, "{:?} at {}", family, x);
            }
        }
    }

    #[test]
    fn test_low_sensitivity_flattens_center() {
        for family in [CurveFamily::Exponential, CurveFamily::Logarithmic] {
            let params = CurveParams::linear().with_sensitivity(20.0).with_family(family);
            assert!(shape(0.3, &params) < 0.3, "{:?}", family);
            assert!((shape(1.0, &params) - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_high_sensitivity_steepens_center() {
        for family in [CurveFamily::Exponential, CurveFamily::Logarithmic] {
            let params = CurveParams::linear().with_sensitivity(80.0).with_family(family);
            assert!(shape(0.3, &params) > 0.3, "{:?}", family);
            assert!((shape(1.0, &params) - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_linear_family_ignores_sensitivity() {
        let params = CurveParams::linear()
            .with_sensitivity(5.0)
            .with_family(CurveFamily::Linear);
        assert!((shape(0.3, &params) - 0.3).abs() < TOLERANCE);
    }

    #[test]
    fn test_curve_is_continuous_across_fifty() {
        for family in [CurveFamily::Exponential, CurveFamily::Logarithmic] {
            let below = CurveParams::linear().with_sensitivity(49.999).with_family(family);
            let above = CurveParams::linear().with_sensitivity(50.001).with_family(family);
            for x in sweep() {
                assert!((shape(x, &below) - shape(x, &above)).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_curve_symmetry() {
        let params = CurveParams::default().with_sensitivity(30.0);
        assert!((shape(0.5, &params) + shape(-0.5, &params)).abs() < TOLERANCE);
    }

    // ==================== Invert / Range Tests ====================

    #[test]
    fn test_invert_bipolar_negates() {
        let params = CurveParams::linear().with_invert(true);
        assert!((shape(0.4, &params) + 0.4).abs() < TOLERANCE);
        assert!((shape(-1.0, &params) - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_unipolar_clamps_negative_input() {
        let params = CurveParams::linear().with_range(AxisRange::Unipolar);
        assert_eq!(shape(-0.5, &params), 0.0);
        assert!((shape(0.25, &params) - 0.25).abs() < TOLERANCE);
    }

    #[test]
    fn test_invert_ignored_on_unipolar() {
        let params = CurveParams::linear()
            .with_range(AxisRange::Unipolar)
            .with_deadzone_percent(10.0)
            .with_invert(true);
        // Rest stays at rest
        assert_eq!(shape(0.0, &params), 0.0);
        assert_eq!(shape(0.05, &params), 0.0);
        assert_eq!(shape(1.0, &params), 1.0);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        let params = CurveParams::linear();
        assert_eq!(shape(3.0, &params), 1.0);
        assert_eq!(shape(-3.0, &params), -1.0);
    }

    #[test]
    fn test_nan_input_is_neutral() {
        assert_eq!(shape(f32::NAN, &CurveParams::default()), 0.0);
    }

    // ==================== Sanitize Tests ====================

    #[test]
    fn test_sanitized_clamps_percentages() {
        let params = CurveParams::linear()
            .with_sensitivity(150.0)
            .with_deadzone_percent(-5.0)
            .with_extremity_percent(120.0)
            .sanitized("test");
        assert_eq!(params.sensitivity_percent, 100.0);
        assert_eq!(params.deadzone_percent, 0.0);
        assert_eq!(params.extremity_deadzone_percent, MAX_DEADZONE_PERCENT);
    }

    #[test]
    fn test_sanitized_replaces_non_finite() {
        let params = CurveParams::linear()
            .with_sensitivity(f32::NAN)
            .with_deadzone_percent(f32::INFINITY)
            .sanitized("test");
        assert_eq!(params.sensitivity_percent, NEUTRAL_SENSITIVITY);
        assert_eq!(params.deadzone_percent, CurveParams::default().deadzone_percent);
    }

    #[test]
    fn test_sanitized_clears_invert_on_unipolar() {
        let params = CurveParams::linear()
            .with_range(AxisRange::Unipolar)
            .with_invert(true)
            .sanitized("throttle");
        assert!(!params.invert);

        let bipolar = CurveParams::linear().with_invert(true).sanitized("rudder");
        assert!(bipolar.invert);
    }

    #[test]
    fn test_sanitized_keeps_legal_values() {
        let original = CurveParams::default().with_sensitivity(70.0);
        assert_eq!(original.sanitized("test"), original);
    }
}
