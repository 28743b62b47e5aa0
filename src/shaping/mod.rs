//! # Shaping Module
//!
//! Turns raw pointer samples and button edges into driver-ready values.
//!
//! This module handles:
//! - Deadzones, extremity deadzones and sensitivity curves ([`curve`])
//! - Toggle and momentary button semantics ([`button`])
//! - Bounded-slew interpolation between ticks ([`smoothing`])

pub mod button;
pub mod curve;
pub mod smoothing;

pub use button::{ButtonChannel, ButtonMode, ButtonState};
pub use curve::{shape, AxisRange, CurveFamily, CurveParams};
pub use smoothing::{SlewLimit, SmoothingScheduler};
